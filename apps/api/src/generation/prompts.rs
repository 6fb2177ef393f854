// Prompt constants for cold email generation.

/// Cold email prompt template. Replace `{portfolio_text}` before sending.
pub const COLD_EMAIL_PROMPT_TEMPLATE: &str = "
You are an expert cold email writer.

Based on the following portfolio:
{portfolio_text}

Write a cold email to a company offering software or web development services.
Keep it short, professional, and impressive.
";

/// Builds the full prompt around the combined job description and snippet.
pub fn cold_email_prompt(portfolio_text: &str) -> String {
    COLD_EMAIL_PROMPT_TEMPLATE.replace("{portfolio_text}", portfolio_text)
}

/// Text handed to the generator: the scraped job description followed by the
/// retrieved portfolio snippet (either may be empty).
pub fn combine_inputs(job_description: &str, relevant_portfolio: &str) -> String {
    format!("Job Description: {job_description}\n{relevant_portfolio}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_embeds_text() {
        let prompt = cold_email_prompt("Job Description: SRE\nTech Stack: Rust");
        assert!(prompt.contains("Based on the following portfolio:\nJob Description: SRE\nTech Stack: Rust\n"));
        assert!(prompt.starts_with("\nYou are an expert cold email writer."));
        assert!(!prompt.contains("{portfolio_text}"));
    }

    #[test]
    fn test_combine_inputs_with_empty_parts() {
        assert_eq!(combine_inputs("", ""), "Job Description: \n");
        assert_eq!(
            combine_inputs("Backend Engineer - Build APIs", "Tech Stack: Go"),
            "Job Description: Backend Engineer - Build APIs\nTech Stack: Go"
        );
    }
}
