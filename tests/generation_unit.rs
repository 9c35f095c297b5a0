use serde_json::json;

use ifumsa_backend::ai_client::{
    build_prompt, extract_questions_value, normalize_questions, MAX_DOCUMENT_CHARS,
};
use ifumsa_backend::api::quizzes::{compute_score, strip_answers, validate_questions};
use ifumsa_backend::models::QuizQuestion;

#[test]
fn prompt_includes_topic_and_demands_raw_json() {
    let prompt = build_prompt(Some("Anatomy of the heart"), None, 5);
    assert!(prompt.contains("Anatomy of the heart"));
    assert!(prompt.contains("5 multiple-choice questions"));
    assert!(prompt.contains("raw JSON only"));
}

#[test]
fn prompt_clips_oversized_documents() {
    let document = "x".repeat(MAX_DOCUMENT_CHARS + 5_000);
    let prompt = build_prompt(None, Some(&document), 10);
    assert!(prompt.len() < document.len());
    assert!(prompt.contains(&"x".repeat(100)));
}

#[test]
fn direct_json_parses_without_fallback() {
    let raw = r#"{"questions":[{"question":"Q?","options":["a","b"],"correct_answer":1}]}"#;
    let value = extract_questions_value(raw).expect("parses");
    assert_eq!(value["questions"].as_array().unwrap().len(), 1);
}

#[test]
fn fallback_extracts_json_wrapped_in_prose() {
    let raw = "Sure! Here are your questions:\n```json\n{\"questions\":[{\"question\":\"Q?\",\
               \"options\":[\"a\",\"b\"],\"correct_answer\":0}]}\n```\nLet me know!";
    let value = extract_questions_value(raw).expect("fallback parses");
    assert_eq!(value["questions"].as_array().unwrap().len(), 1);
}

#[test]
fn garbage_output_yields_none() {
    assert!(extract_questions_value("I could not generate questions.").is_none());
    assert!(extract_questions_value("{\"answers\": []}").is_none());
    assert!(extract_questions_value("").is_none());
}

#[test]
fn normalization_fills_placeholders_and_clamps_answers() {
    let value = json!({
        "questions": [
            { "options": ["a", "b", "c"], "correct_answer": 7 },
            { "question": "Fine question", "options": ["x", "y"], "correct_answer": 1,
              "explanation": "because" },
            { "question": "No options at all" }
        ]
    });

    let questions = normalize_questions(&value);
    assert_eq!(questions.len(), 3);

    assert_eq!(questions[0].question, "Untitled question");
    assert_eq!(questions[0].correct_answer, 2);

    assert_eq!(questions[1].question, "Fine question");
    assert_eq!(questions[1].correct_answer, 1);
    assert_eq!(questions[1].explanation.as_deref(), Some("because"));

    assert!(questions[2].options.len() >= 2);
    assert_eq!(questions[2].correct_answer, 0);
}

#[test]
fn normalization_of_non_array_questions_is_empty() {
    assert!(normalize_questions(&json!({"questions": "none"})).is_empty());
    assert!(normalize_questions(&json!({})).is_empty());
}

#[test]
fn score_rounds_to_nearest_percent() {
    assert_eq!(compute_score(10, 10), 100);
    assert_eq!(compute_score(0, 10), 0);
    assert_eq!(compute_score(1, 3), 33);
    assert_eq!(compute_score(2, 3), 67);
    assert_eq!(compute_score(1, 8), 13);
    assert_eq!(compute_score(0, 0), 0);
}

#[test]
fn strip_answers_removes_the_answer_key() {
    let questions = vec![QuizQuestion {
        question: "Q?".to_string(),
        options: vec!["a".to_string(), "b".to_string()],
        correct_answer: 1,
        explanation: Some("secret".to_string()),
    }];

    let public = strip_answers(&questions);
    assert_eq!(public.len(), 1);
    assert!(public[0].get("correct_answer").is_none());
    assert!(public[0].get("explanation").is_none());
    assert_eq!(public[0]["question"], "Q?");
    assert_eq!(public[0]["options"].as_array().unwrap().len(), 2);
}

#[test]
fn question_validation_catches_bad_input() {
    assert!(validate_questions(&[]).is_err());

    let bad_index = vec![QuizQuestion {
        question: "Q?".to_string(),
        options: vec!["a".to_string(), "b".to_string()],
        correct_answer: 2,
        explanation: None,
    }];
    assert!(validate_questions(&bad_index).is_err());

    let one_option = vec![QuizQuestion {
        question: "Q?".to_string(),
        options: vec!["a".to_string()],
        correct_answer: 0,
        explanation: None,
    }];
    assert!(validate_questions(&one_option).is_err());

    let fine = vec![QuizQuestion {
        question: "Q?".to_string(),
        options: vec!["a".to_string(), "b".to_string()],
        correct_answer: 0,
        explanation: None,
    }];
    assert!(validate_questions(&fine).is_ok());
}
