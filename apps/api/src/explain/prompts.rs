//! Prompt builders for the explanation pipeline. The single and bulk paths
//! deliberately use different prompt shapes, which is why their cache
//! entries are independent.

pub fn single_explanation_prompt(question: &str) -> String {
    format!(
        "You are an AI trained to generate explanations for technical interview questions.\n\
         Explain the following interview question in depth, as if teaching a beginner:\n\
         Question: \"{question}\"\n\n\
         Return a JSON object with this EXACT schema (no extra fields):\n\
         {{\"title\": \"short title for the concept\", \"explanation\": \"detailed explanation\"}}\n\
         Do NOT use markdown code fences. Do NOT include any text outside the JSON object."
    )
}

pub fn batch_explanation_prompt(questions: &[String]) -> String {
    let numbered = questions
        .iter()
        .enumerate()
        .map(|(i, q)| format!("{}. {q}", i + 1))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "You are an AI trained to generate explanations for technical interview questions.\n\
         Explain each of the following interview questions in depth:\n\
         {numbered}\n\n\
         Return ONLY a raw JSON array with one object per question, in the SAME ORDER as the \
         input, each with this EXACT schema:\n\
         {{\"title\": \"short title for the concept\", \"explanation\": \"detailed explanation\"}}\n\
         Do NOT use markdown code fences. Do NOT include any text outside the JSON array."
    )
}
