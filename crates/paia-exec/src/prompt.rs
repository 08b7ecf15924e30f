//! Prompt text assembled for the assistant.

use paia_core::Exchange;

/// System instruction sent with every direct API request.
pub const SYSTEM_PROMPT: &str = "You are a personal assistant with access to Obsidian vault functions.

Available MCP functions:
- mcp__obsidian__search_notes(searchTerm, searchType)
- mcp__obsidian__get_note(notePath)
- mcp__obsidian__update_note_section(notePath, sectionHeading, newContent)
- And other Obsidian MCP functions for vault management

When you see @paia instructions in notes, analyze the context and execute the requested actions.";

/// Substring that marks a search result as failed.
pub const ERROR_MARKER: &str = "Error";

/// Flattens recent history and the new request into one prompt.
///
/// With no history the request goes out unchanged. Otherwise the last
/// `window` exchanges are replayed oldest first as numbered
/// "Previous Exchange" blocks ahead of the request.
pub fn build_contextual_prompt(prior: &[Exchange], request: &str, window: usize) -> String {
    if prior.is_empty() {
        return request.to_string();
    }

    let start = prior.len().saturating_sub(window);
    let mut prompt =
        String::from("You are continuing a previous conversation. Here's the context:\n\n");
    for (idx, exchange) in prior[start..].iter().enumerate() {
        prompt.push_str(&format!("Previous Exchange {}:\n", idx + 1));
        prompt.push_str(&format!("Input: {}\n", exchange.input));
        prompt.push_str(&format!("Output: {}\n\n", exchange.output));
    }
    prompt.push_str(&format!("Current Request: {request}\n\n"));
    prompt.push_str("Please respond considering the full context above.");
    prompt
}

pub fn build_search_prompt(function_call: &str) -> String {
    format!("Execute this MCP function and return only the result: {function_call}")
}

pub fn build_analysis_prompt(marker: &str, search_results: &str) -> String {
    format!(
        "Found {marker} instructions in vault. Based on the search results below, analyze each \
{marker} instruction and execute the requested actions:

Search Results:
{search_results}

For each {marker} instruction found:
1. Read the full context of the note containing the instruction
2. Understand what action is being requested
3. Execute the action using appropriate MCP functions
4. Mark the {marker} instruction as completed
5. Repeat for every other {marker} instruction in the results

Please process all {marker} instructions found."
    )
}

pub fn nothing_found_message(marker: &str) -> String {
    format!("No {marker} instructions found or search failed")
}

/// First `max` characters of `text` on a single line, for log lines.
pub fn preview(text: &str, max: usize) -> String {
    let mut chars = text
        .chars()
        .map(|ch| if ch == '\n' || ch == '\r' { ' ' } else { ch });
    let head: String = chars.by_ref().take(max).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn history(count: usize) -> Vec<Exchange> {
        (1..=count)
            .map(|n| Exchange::new(format!("in-{n}"), format!("out-{n}")))
            .collect()
    }

    #[test]
    fn empty_history_sends_request_verbatim() {
        let request = "Search my vault for \"@paia\" instructions";
        assert_eq!(build_contextual_prompt(&[], request, 3), request);
    }

    #[test]
    fn single_exchange_is_replayed_before_request() {
        let prompt = build_contextual_prompt(&history(1), "next", 3);
        assert_eq!(
            prompt,
            "You are continuing a previous conversation. Here's the context:\n\n\
Previous Exchange 1:\nInput: in-1\nOutput: out-1\n\n\
Current Request: next\n\n\
Please respond considering the full context above."
        );
    }

    #[test]
    fn only_three_most_recent_exchanges_are_replayed_oldest_first() {
        let prompt = build_contextual_prompt(&history(5), "next", 3);

        assert_eq!(prompt.matches("Previous Exchange").count(), 3);
        assert!(!prompt.contains("in-2"));
        let third = prompt.find("Input: in-3").expect("in-3");
        let fourth = prompt.find("Input: in-4").expect("in-4");
        let fifth = prompt.find("Input: in-5").expect("in-5");
        let request = prompt.find("Current Request: next").expect("request");
        assert!(third < fourth && fourth < fifth && fifth < request);
        assert!(prompt.contains("Previous Exchange 1:\nInput: in-3"));
    }

    #[test]
    fn block_count_is_min_of_history_and_window() {
        for count in 1..=6 {
            let prompt = build_contextual_prompt(&history(count), "next", 3);
            assert_eq!(prompt.matches("Previous Exchange").count(), count.min(3));
        }
    }

    #[test]
    fn analysis_prompt_embeds_search_results_and_steps() {
        let prompt = build_analysis_prompt("@paia", "Note A: @paia remind me");
        assert!(prompt.contains("Search Results:\nNote A: @paia remind me\n"));
        for step in ["1. Read", "2. Understand", "3. Execute", "4. Mark", "5. Repeat"] {
            assert!(prompt.contains(step), "missing {step}");
        }
    }

    #[test]
    fn preview_truncates_on_char_boundaries() {
        assert_eq!(preview("short", 50), "short");
        assert_eq!(preview("déjà vu", 4), "déjà...");
    }

    #[test]
    fn preview_stays_on_one_line() {
        assert_eq!(preview("Input: a\r\nOutput: b\n", 50), "Input: a  Output: b ");
    }

    #[test]
    fn nothing_found_message_matches_marker() {
        assert_eq!(
            nothing_found_message("@paia"),
            "No @paia instructions found or search failed"
        );
    }
}
