//! End-to-end scenarios (spec §8), run through the orchestrator's public
//! API rather than the built binary, since these tests run as part of
//! `cargo test` before any binary exists on disk.

use corpbias_engine::model::input::IntegratedRecord;
use corpbias_engine::model::market::MarketReference;
use corpbias_engine::orchestrator::run_analysis;

fn record_from_json(raw: &str) -> IntegratedRecord {
    serde_json::from_str(raw).expect("fixture parses")
}

#[test]
fn scenario_1_single_entity_minimal_end_to_end() {
    let record = record_from_json(
        r#"{
            "perplexity_sentiment": {
                "retail": {
                    "widgets": {
                        "masked_values": [3, 3, 3, 3, 3],
                        "entities": { "Acme": { "unmasked_values": [4, 4, 4, 4, 4] } }
                    }
                }
            }
        }"#,
    );
    let market = MarketReference::empty();
    let envelope = run_analysis(&record, &market, 7, "20260101", "test").unwrap();
    let entity = &envelope.sentiment_bias_analysis["retail"]["widgets"].entities[0];
    assert_eq!(entity.basic_metrics.raw_delta, 1.0);
    assert_eq!(entity.bias_index, 1.0);
    assert!((entity.statistical_significance.sign_test_p_value.unwrap() - 0.0625).abs() < 1e-3);
    assert_eq!(entity.confidence_interval.ci_lower, entity.confidence_interval.ci_upper);
    assert_eq!(entity.stability_metrics.stability_score, 1.0);
}

#[test]
fn scenario_5_inequality_end_to_end() {
    let record = record_from_json(
        r#"{
            "perplexity_sentiment": {
                "retail": {
                    "widgets": {
                        "masked_values": [3, 3, 3, 3, 3],
                        "entities": {
                            "A": { "unmasked_values": [5, 5, 5, 5, 5] },
                            "B": { "unmasked_values": [3, 3, 3, 3, 3] },
                            "C": { "unmasked_values": [3, 3, 3, 3, 3] },
                            "D": { "unmasked_values": [3, 3, 3, 3, 3] },
                            "E": { "unmasked_values": [1, 1, 1, 1, 1] }
                        }
                    }
                }
            }
        }"#,
    );
    let market = MarketReference::empty();
    let envelope = run_analysis(&record, &market, 7, "20260101", "test").unwrap();
    let market_structure = &envelope.relative_bias_analysis["retail"].subcategories["widgets"];
    assert!(market_structure.bias_inequality.gini >= 0.55 && market_structure.bias_inequality.gini <= 0.65);
    assert_eq!(market_structure.bias_inequality.range, 4.0);
    assert_eq!(market_structure.bias_inequality.band, "strong");
}

#[test]
fn n_equals_one_is_well_formed_but_sparse() {
    let record = record_from_json(
        r#"{
            "perplexity_sentiment": {
                "retail": {
                    "widgets": {
                        "masked_avg": 3.0,
                        "entities": { "Acme": { "unmasked_avg": 4.0 } }
                    }
                }
            }
        }"#,
    );
    let market = MarketReference::empty();
    let envelope = run_analysis(&record, &market, 7, "20260101", "test").unwrap();
    let entity = &envelope.sentiment_bias_analysis["retail"]["widgets"].entities[0];
    assert_eq!(entity.basic_metrics.execution_count, 1);
    assert_eq!(entity.basic_metrics.raw_delta, 1.0);
    assert!(!entity.statistical_significance.available);
    assert!(!entity.effect_size.available);
    assert!(!entity.confidence_interval.available);
}

#[test]
fn identical_masked_and_unmasked_values_yield_zero_bias() {
    let record = record_from_json(
        r#"{
            "perplexity_sentiment": {
                "retail": {
                    "widgets": {
                        "masked_values": [3, 3, 3, 3, 3],
                        "entities": { "Acme": { "unmasked_values": [3, 3, 3, 3, 3] } }
                    }
                }
            }
        }"#,
    );
    let market = MarketReference::empty();
    let envelope = run_analysis(&record, &market, 7, "20260101", "test").unwrap();
    let entity = &envelope.sentiment_bias_analysis["retail"]["widgets"].entities[0];
    assert_eq!(entity.basic_metrics.raw_delta, 0.0);
    assert_eq!(entity.bias_index, 0.0);
    assert_eq!(entity.effect_size.cliffs_delta, Some(0.0));
    assert_eq!(entity.confidence_interval.ci_lower, Some(0.0));
    assert_eq!(entity.confidence_interval.ci_upper, Some(0.0));
}

#[test]
fn same_seed_produces_identical_output_modulo_timestamps() {
    let record = record_from_json(
        r#"{
            "perplexity_sentiment": {
                "retail": {
                    "widgets": {
                        "masked_values": [3, 3, 3, 4, 2, 3, 3, 4],
                        "entities": {
                            "A": { "unmasked_values": [4, 4, 5, 4, 3, 4, 5, 4] },
                            "B": { "unmasked_values": [2, 2, 3, 2, 1, 2, 3, 2] }
                        }
                    }
                }
            }
        }"#,
    );
    let market = MarketReference::empty();
    let first = run_analysis(&record, &market, 99, "20260101", "test").unwrap();
    let second = run_analysis(&record, &market, 99, "20260101", "test").unwrap();
    let first_json = serde_json::to_string(&first).unwrap();
    let second_json = serde_json::to_string(&second).unwrap();
    assert_eq!(first_json, second_json);
}

#[test]
fn missing_perplexity_sentiment_is_a_fatal_structural_error() {
    let record = record_from_json(r#"{"metadata": {"note": "no sentiment block"}}"#);
    let market = MarketReference::empty();
    assert!(run_analysis(&record, &market, 1, "20260101", "test").is_err());
}
