//! Few-shot summary prompt.

/// Bumped whenever [`SUMMARY_PROMPT`] changes wording.
pub const PROMPT_VERSION: u32 = 1;

/// The single substitution point in [`SUMMARY_PROMPT`].
pub const CONTEXT_PLACEHOLDER: &str = "{context}";

/// Summary instructions with three worked examples (text, table, image description).
pub const SUMMARY_PROMPT: &str = r#"You are an expert at summarizing document content for downstream LLM analysis.
Your goal is to provide a descriptive but concise summary of the following document block.

**Examples:**

*Input (Text):*
"The company reported a 15% increase in revenue for Q3, reaching $4.2 billion. This growth was primarily driven by strong sales in the cloud services division, which grew by 22% year-over-year. Operating margins also improved from 18% to 20%."
*Output:*
This block discusses the financial performance of a company for Q3. Revenue increased 15% to $4.2 billion, led by a 22% growth in cloud services, while operating margins improved to 20%.

*Input (Table):*
| Category | 2022 Sales | 2023 Sales | Change |
|----------|------------|------------|--------|
| Laptops  | 1200       | 1500       | +25%   |
| Tablets  | 800        | 750        | -6.25% |
| Phones   | 3000       | 3200       | +6.7%  |
*Output:*
The content is a sales comparison table for different electronics categories between 2022 and 2023. It shows growth in laptops (+25%) and phones (+6.7%), while tablet sales saw a slight decline of 6.25%.

*Input (Image/Figure Description):*
"Image description: A line chart titled 'Monthly Active Users' showing a steady upward trend from January (2M) to December (5.5M) 2023. The steeper growth is visible from June onwards."
*Output:*
This content describes a line chart showing monthly active user growth in 2023. Users increased from 2M in January to 5.5M in December, with growth accelerating after June.

**Content to summarize:**
{context}

**Guidelines:**
- Be descriptive but concise.
- Limit the summary to exactly 3 sentences maximum.
- If the content is a table, do NOT include all data points. Instead, provide representative examples of the data contained.
- The summary will be used by another LLM to answer questions about the document.

**Instructions:**
1. Analyze the content provided.
2. Provide a 1-2 sentence analysis of what the content is.
3. Provide a summary (max 3 sentences) that captures the core information.
"#;

/// Render the summary prompt for one block's context.
///
/// Substitution happens once; braces inside `context` are left untouched.
pub fn render_summary_prompt(context: &str) -> String {
    match SUMMARY_PROMPT.split_once(CONTEXT_PLACEHOLDER) {
        Some((head, tail)) => {
            let mut prompt = String::with_capacity(SUMMARY_PROMPT.len() + context.len());
            prompt.push_str(head);
            prompt.push_str(context);
            prompt.push_str(tail);
            prompt
        }
        None => SUMMARY_PROMPT.to_string(),
    }
}
