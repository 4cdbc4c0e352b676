//! Per-model price table, USD per 1K tokens.

/// `(prompt, completion)` price per 1K tokens.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelPricing {
    pub prompt: f64,
    pub completion: f64,
}

const FALLBACK_MODEL: &str = "gpt-3.5-turbo";

const PRICING: &[(&str, ModelPricing)] = &[
    ("gpt-4o", ModelPricing { prompt: 0.01, completion: 0.03 }),
    ("gpt-4", ModelPricing { prompt: 0.03, completion: 0.06 }),
    ("gpt-4-32k", ModelPricing { prompt: 0.06, completion: 0.12 }),
    ("gpt-3.5-turbo", ModelPricing { prompt: 0.0015, completion: 0.002 }),
    ("gpt-3.5-turbo-16k", ModelPricing { prompt: 0.003, completion: 0.004 }),
];

/// Pricing for `model`; unknown models are billed as gpt-3.5-turbo.
pub fn pricing_for(model: &str) -> ModelPricing {
    let lookup = |name: &str| PRICING.iter().find(|(m, _)| *m == name).map(|(_, p)| *p);
    lookup(model)
        .or_else(|| lookup(FALLBACK_MODEL))
        .unwrap_or(ModelPricing { prompt: 0.0, completion: 0.0 })
}

/// Estimated USD cost of one request.
pub fn estimate_cost(model: &str, prompt_tokens: i64, completion_tokens: i64) -> f64 {
    let pricing = pricing_for(model);
    (prompt_tokens as f64 / 1000.0) * pricing.prompt
        + (completion_tokens as f64 / 1000.0) * pricing.completion
}
