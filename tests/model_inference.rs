//! Integration tests against a real classification model.
//!
//! These tests require a model export (tokenizer.json, config.json,
//! model.safetensors) in MODEL_PATH, or ./models by default.
//!
//! Run with: cargo test --features integ_test --test model_inference

#[cfg(feature = "integ_test")]
mod tests {
    use std::path::PathBuf;
    use std::sync::Arc;

    use toxiguard::classifier::{ClassifierService, TextClassifier, ToxicityModel};
    use toxiguard::config::ModelSettings;

    fn model_path() -> PathBuf {
        std::env::var("MODEL_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("models"))
    }

    fn has_model() -> bool {
        let path = model_path();
        if !path.join("model.safetensors").exists() {
            eprintln!("Skipping test: model not found at {:?}", path);
            return false;
        }
        true
    }

    fn settings() -> ModelSettings {
        ModelSettings {
            model_path: model_path(),
            max_length: 256,
        }
    }

    #[test]
    fn test_model_loads_and_predicts() {
        if !has_model() {
            return;
        }

        let model = ToxicityModel::load(&model_path(), 256).expect("Failed to load model");
        let prediction = model.predict("Привет, как дела?").expect("Prediction failed");
        println!("Prediction: {:?}", prediction);

        assert!(prediction.confidence > 0.0 && prediction.confidence <= 1.0);
    }

    #[test]
    fn test_long_input_is_truncated() {
        if !has_model() {
            return;
        }

        let model = ToxicityModel::load(&model_path(), 32).expect("Failed to load model");
        let text = "очень длинный текст ".repeat(500);
        assert!(model.predict(&text).is_ok());
    }

    #[tokio::test]
    async fn test_service_class_ids_in_range() {
        if !has_model() {
            return;
        }

        let service = ClassifierService::new(settings());
        for text in ["Хорошего дня!", "ты идиот", "это просто текст"] {
            let verdict = service.classify(text).await.expect("model should load");
            assert!(!verdict.is_degraded(), "{text}: {verdict:?}");
            assert!(verdict.class_id() <= 2, "{text}: {verdict:?}");
        }
        assert!(service.is_loaded());
    }

    #[tokio::test]
    async fn test_concurrent_first_calls_share_one_model() {
        if !has_model() {
            return;
        }

        let service = Arc::new(ClassifierService::new(settings()));
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let service = service.clone();
                tokio::spawn(async move { service.classify(&format!("сообщение {i}")).await })
            })
            .collect();

        for handle in handles {
            assert!(handle.await.unwrap().is_ok());
        }
    }
}
