//! Prompt templating for the quality and instruction paths.

use crate::generation::gateway::SuggestionRequest;
use crate::models::goal_labels;

const SUGGESTION_LIST_DIRECTIVE: &str = "Respond with a JSON array only. Each element must be an object with the fields \
\"title\", \"description\", \"code_sample\", \"priority\" (an integer, 1 is the highest) and \
\"impact\" (\"low\", \"medium\" or \"high\"). Return an empty array if nothing should change.";

const REPLACEMENT_LIST_DIRECTIVE: &str = "Respond with a JSON array only. Each element must describe one change that carries out \
the instructions above and be an object with the fields \"title\", \"description\", \
\"code_sample\" (the complete rewritten function, not a fragment), \"priority\" (an integer, \
1 is the highest) and \"impact\" (\"low\", \"medium\" or \"high\").";

/// Build the single prompt sent for `request`.
pub fn build_prompt(request: &SuggestionRequest) -> String {
    let language = request.language;
    let mut prompt = format!(
        "You are an experienced {language} engineer. Review the following code:\n\n```{}\n{}\n```\n\n",
        language.fence_tag(),
        request.source.trim_end(),
    );

    prompt.push_str(&format!("Improvement goals: {}\n\n", goal_labels(&request.goals)));

    if !request.constraints.is_empty() {
        prompt.push_str("Constraints:\n");
        for constraint in &request.constraints {
            prompt.push_str(&format!("- {}\n", constraint.describe()));
        }
        prompt.push('\n');
    }

    match request.instructions.as_deref() {
        Some(instructions) => {
            prompt.push_str("Instructions:\n");
            prompt.push_str(instructions);
            prompt.push_str("\n\n");
            prompt.push_str(REPLACEMENT_LIST_DIRECTIVE);
        }
        None => prompt.push_str(SUGGESTION_LIST_DIRECTIVE),
    }
    prompt.push('\n');
    prompt
}
