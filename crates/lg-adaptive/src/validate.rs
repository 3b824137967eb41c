//! Business-rule validation for adaptive models.

use crate::error::AdaptiveError;
use crate::model::AdaptiveModel;
use crate::provider::CLIPBOARD_PROVIDER;

/// Validates the single-integration-mode-set rule.
pub fn validate_model(model: &AdaptiveModel, context: &str) -> Result<(), AdaptiveError> {
    let sets = model.integration_mode_sets();
    if sets.len() > 1 {
        return Err(AdaptiveError::MultipleIntegrationModeSets {
            mode_sets: sets.iter().map(|s| s.id.clone()).collect(),
            context: context.to_string(),
        });
    }
    if sets.is_empty() {
        return Err(AdaptiveError::NoIntegrationModeSet {
            context: context.to_string(),
        });
    }
    Ok(())
}

/// Validates a `{% mode set:mode %}` reference against the model.
pub fn validate_mode_reference(
    model: &AdaptiveModel,
    set: &str,
    mode: &str,
    context: &str,
) -> Result<(), AdaptiveError> {
    if model.has_mode(set, mode) {
        return Ok(());
    }
    let available = model
        .mode_sets
        .get(set)
        .map(|s| s.modes.keys().cloned().collect())
        .unwrap_or_default();
    Err(AdaptiveError::InvalidModeReference {
        set: set.to_string(),
        mode: mode.to_string(),
        context: context.to_string(),
        available,
    })
}

/// Validates that the integration mode-set supports a provider.
///
/// The clipboard provider is universal. Filtering uses the *full* id; an
/// empty filtered set is the failure case.
pub fn validate_provider_support(
    model: &AdaptiveModel,
    provider_id: &str,
    context: &str,
) -> Result<(), AdaptiveError> {
    if provider_id == CLIPBOARD_PROVIDER {
        return Ok(());
    }
    validate_model(model, context)?;
    let integration = model
        .integration_mode_set()
        .expect("validated single integration set");

    let filtered = integration.filter_by_provider(provider_id);
    if filtered.modes.is_empty() {
        return Err(AdaptiveError::ProviderNotSupported {
            provider: provider_id.to_string(),
            context: context.to_string(),
            available: integration.supported_providers().into_iter().collect(),
        });
    }
    Ok(())
}
