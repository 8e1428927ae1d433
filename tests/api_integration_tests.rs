use dotenv::dotenv;
use meal_optim::api_connection::{
    endpoints::OPENROUTER_MODELS, ApiConnectionError, ChatCompletionRequest, ChatMessage, Provider,
    ResponseFormat,
};
use meal_optim::ingredient_extractor::{extract_ingredients, API_KEY_ENV_VAR};
use std::env;

// Helper to select a model that is known to be Cerebras-powered from OPENROUTER_MODELS
fn get_cerebras_test_model() -> String {
    OPENROUTER_MODELS
        .iter()
        .find(|m| m.model_source == "cerebras")
        .map(|m| m.model_name.to_string())
        .expect("No Cerebras model found in OPENROUTER_MODELS for testing")
}

fn setup_test_environment() {
    dotenv().ok();
}

fn hello_request() -> ChatCompletionRequest {
    ChatCompletionRequest {
        model: get_cerebras_test_model(),
        messages: vec![ChatMessage::user("Hello")],
        response_format: None,
        temperature: None,
        max_tokens: None,
    }
}

#[tokio::test]
async fn test_missing_api_key_error() {
    setup_test_environment();
    let provider = Provider::openrouter("THIS_KEY_SHOULD_NOT_EXIST_IN_ENV_ABXYZ");
    let result = provider.call_chat_completion(hello_request()).await;
    assert!(matches!(result, Err(ApiConnectionError::MissingApiKey(_))));
    if let Err(ApiConnectionError::MissingApiKey(key_name)) = result {
        assert_eq!(key_name, "THIS_KEY_SHOULD_NOT_EXIST_IN_ENV_ABXYZ");
    }
}

#[tokio::test]
async fn test_extraction_surfaces_missing_key() {
    setup_test_environment();
    let provider = Provider::openrouter("THIS_KEY_SHOULD_NOT_EXIST_IN_ENV_ABXYZ");
    let result = extract_ingredients(&provider, &get_cerebras_test_model(), "- 2 cups rice").await;
    assert!(matches!(result, Err(ApiConnectionError::MissingApiKey(_))));
}

#[test]
fn test_request_omits_unset_options() {
    let payload = serde_json::to_value(hello_request()).unwrap();
    let obj = payload.as_object().unwrap();
    assert_eq!(obj["model"], "qwen/qwen3-32b");
    assert_eq!(obj["messages"][0]["role"], "user");
    assert!(!obj.contains_key("response_format"));
    assert!(!obj.contains_key("temperature"));

    let json_mode = ChatCompletionRequest {
        response_format: Some(ResponseFormat::json_object()),
        ..hello_request()
    };
    let payload = serde_json::to_value(json_mode).unwrap();
    assert_eq!(payload["response_format"]["type"], "json_object");
}

#[test]
fn test_default_model_is_first_listed() {
    let provider = Provider::openrouter(API_KEY_ENV_VAR);
    assert_eq!(provider.default_model(), Some(OPENROUTER_MODELS[0].model_name));
    assert_eq!(provider.get_available_models().len(), OPENROUTER_MODELS.len());
}

#[tokio::test]
#[ignore]
async fn test_successful_ingredient_extraction() {
    setup_test_environment();
    if env::var(API_KEY_ENV_VAR).is_err() {
        println!(
            "Skipping test_successful_ingredient_extraction: {} not set.",
            API_KEY_ENV_VAR
        );
        return;
    }

    let provider = Provider::openrouter(API_KEY_ENV_VAR);
    let raw = "### Sauce\n- 2 tbsp soy sauce\n- 1 tsp sesame oil\n\n### Noodles\n- 200g wide rice noodles";
    let result = extract_ingredients(&provider, &get_cerebras_test_model(), raw).await;
    assert!(result.is_ok(), "Extraction failed: {:?}", result.err());
    let sections = result.unwrap();
    let items: Vec<String> = sections
        .iter()
        .flat_map(|s| s.items.iter())
        .map(|i| i.item.to_lowercase())
        .collect();
    assert!(items.iter().any(|i| i.contains("soy sauce")), "items: {:?}", items);
    assert!(items.iter().any(|i| i.contains("noodle")), "items: {:?}", items);
}

#[tokio::test]
#[ignore]
async fn test_api_error_with_invalid_key() {
    setup_test_environment(); // Loads .env if present, but we'll override for this test

    const INVALID_KEY_ENV_NAME_FOR_THIS_TEST: &str = "ENV_VAR_WITH_BAD_KEY_VALUE";

    // The variable must exist but hold a key the API rejects.
    unsafe {
        std::env::set_var(
            INVALID_KEY_ENV_NAME_FOR_THIS_TEST,
            "this_is_a_deliberately_bad_api_key_string_for_testing",
        );
    }

    let provider = Provider::openrouter(INVALID_KEY_ENV_NAME_FOR_THIS_TEST);
    let result = provider.call_chat_completion(hello_request()).await;
    assert!(
        matches!(result, Err(ApiConnectionError::ApiError { .. })),
        "Expected ApiError, got {:?}",
        result
    );
    if let Err(ApiConnectionError::ApiError { status, .. }) = result {
        assert_eq!(status, reqwest::StatusCode::UNAUTHORIZED);
    }

    unsafe {
        std::env::remove_var(INVALID_KEY_ENV_NAME_FOR_THIS_TEST);
    }
}
