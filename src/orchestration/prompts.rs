//! Instruction texts and response schemas sent to the model.

use serde_json::{json, Value};

use crate::core::SqaTask;

/// Instruction for generating three SQA examples from one scene.
pub const GENERATION_PROMPT: &str = r#"You have excellent spatial reasoning skills and are tasked with generating three full examples, each consisting of a unique situation, a question, and the correct answer designed to test deep 3D understanding. Each example must be based on the provided POV (point-of-view) video and bird’s-eye view image.
For each example, follow these steps:
First randomly select a position and a facing direction using the scene information. Then, generate a concise description of the situation from that position and direction, focusing only on the spatial layout and key visual elements relevant to orientation and understanding.
Next, create a challenging question that requires substantial situated 3D reasoning—such as visibility, occlusion, relative direction, object alignment, or what can or cannot be seen from the selected viewpoint. The question must require substantial situated reasoning, and avoid questions that could be answered without reference to the current situation, such as “How many chairs are there in the room?”
Finally, provide the correct answer to the question with no explanation needed.
The goal is to test whether someone can accurately comprehend and reason about spatial relationships using both the POV video and the bird’s-eye view image. Keep the description concise, and ensure the question challenges spatial understanding, not just static observation.
Repeat this process three times, generating three separate examples, and include all of them in your response.
Your response json format should be like this:

{
  "situation_description": [
    "string (description of situation 1)",
    "string (description of situation 2)",
    "string (description of situation 3)"
  ],
  "question": [
    "string (question 1)",
    "string (question 2)",
    "string (question 3)"
  ],
  "answer": [
    "string (answer 1)",
    "string (answer 2)",
    "string (answer 3)"
  ]
}"#;

const SCORING_RUBRIC: &str = "You are an expert in spatial reasoning. Your task is to evaluate the quality of a Situation-Question-Answer (SQA) triplet based on a described scene, which includes:
A bird's-eye view description of the environment
A surrounding video providing spatial context
Use the following scoring criteria. For each criterion the QA satisfies, assign 0.2 points.
Scoring Criteria:
You can know where you are based on the situation
You can understand the question perfectly
The answer is correct based on the situation and question
To answer this question, the video or birdeye image of the scene is necessary
To answer this question, you need to understand the 3d relations of the items in the scene and yourself
Your output should include:
Total Score (maximum 1)
List of criteria met (by index, e.g., [1, 3, 5])
And give a explanation for it.
Be concise but precise in your judgment.
Here is the SQA triplet:";

/// Grading instruction with the task's triplet filled in.
pub fn scoring_prompt(task: &SqaTask) -> String {
    format!(
        "{}\nSituation: {}\nQuestion: {}\nAnswer: {}",
        SCORING_RUBRIC, task.situation, task.question, task.answer
    )
}

/// Schema of the generator's response: three parallel string arrays.
pub fn generation_schema() -> Value {
    let string_array = json!({ "type": "ARRAY", "items": { "type": "STRING" } });
    json!({
        "type": "OBJECT",
        "required": ["situation_description", "question", "answer"],
        "properties": {
            "situation_description": string_array,
            "question": string_array,
            "answer": string_array
        }
    })
}

/// Schema of the scorer's response.
pub fn scoring_schema() -> Value {
    json!({
        "type": "OBJECT",
        "required": ["score", "criteria_list", "explanation"],
        "properties": {
            "score": { "type": "NUMBER" },
            "criteria_list": { "type": "ARRAY", "items": { "type": "INTEGER" } },
            "explanation": { "type": "STRING" }
        }
    })
}
