//! Prompt builders for the mock-interview flow. Each prompt pins down the
//! response format; lenient parsing downstream handles models that ignore it.

pub fn opening_question_prompt(role: &str, experience_years: i32, topics: &str) -> String {
    format!(
        "You are an expert interviewer conducting a technical interview for a {role} position \
         with {experience_years} years of experience. The topics to focus on are: {topics}.\n\
         Start the interview by asking the first question.\n\
         Return ONLY the question text. Do not include \"Question 1\" or similar prefixes."
    )
}

pub fn feedback_prompt(question: &str, answer: &str) -> String {
    format!(
        "You are an expert interviewer. The candidate has answered the following question:\n\
         Question: \"{question}\"\n\
         Answer: \"{answer}\"\n\n\
         Provide feedback on the answer. Was it correct? What was missing? How can it be improved?\n\
         Also rate the answer on a scale of 1-10.\n\n\
         Return JSON format:\n\
         {{\n  \"feedback\": \"...\",\n  \"rating\": 8\n}}"
    )
}

pub fn next_question_prompt(transcript: &str) -> String {
    format!(
        "{transcript}\n\n\
         Based on the previous conversation, ask the next relevant interview question.\n\
         If the candidate's last answer was weak, ask a follow-up or dig deeper.\n\
         If it was good, move to the next topic.\n\
         Return ONLY the question text."
    )
}

pub fn final_summary_prompt(transcript: &str) -> String {
    format!(
        "{transcript}\n\n\
         The interview has ended. Provide a comprehensive summary and feedback for the candidate.\n\
         Highlight strengths, areas for improvement, and a final overall score out of 100.\n\n\
         Return JSON format:\n\
         {{\n  \"overallFeedback\": \"...\",\n  \"overallScore\": 85\n}}"
    )
}
