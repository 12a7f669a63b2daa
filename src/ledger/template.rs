//! Compensation template lifecycle.
//!
//! Templates are resolved when created or changed. Once an assignment or
//! an approved revision references a template it is locked, and only its
//! description may change.

use chrono::Utc;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::calculation::{resolve, round_currency};
use crate::config::CompensationDefaults;
use crate::error::{EngineError, EngineResult};
use crate::models::{CompensationTemplate, NewTemplate, TemplateChanges};
use crate::store::TenantData;

/// Resolves and stores a new template.
pub fn create_template(
    data: &mut TenantData,
    new: NewTemplate,
    defaults: &CompensationDefaults,
) -> EngineResult<CompensationTemplate> {
    if new.name.trim().is_empty() {
        return Err(EngineError::validation("name", "must not be empty"));
    }
    let breakdown = resolve(new.annual_ctc, &new.overrides, defaults)?;
    let now = Utc::now();
    let template = CompensationTemplate {
        id: Uuid::new_v4(),
        name: new.name.trim().to_string(),
        description: new.description,
        annual_ctc: breakdown.annual_ctc,
        monthly_ctc: round_currency(breakdown.annual_ctc / Decimal::from(12)),
        overrides: new.overrides,
        breakdown,
        locked: false,
        created_at: now,
        updated_at: now,
    };
    data.templates.insert(template.id, template.clone());
    Ok(template)
}

/// Replaces a template's description. Allowed on locked templates.
pub fn update_template_description(
    data: &mut TenantData,
    template_id: Uuid,
    description: Option<String>,
) -> EngineResult<CompensationTemplate> {
    let template = data
        .templates
        .get_mut(&template_id)
        .ok_or_else(|| EngineError::not_found("Template", template_id))?;
    template.description = description;
    template.updated_at = Utc::now();
    Ok(template.clone())
}

/// Changes an unlocked template's name, CTC or overrides and re-resolves
/// its breakdown.
///
/// # Errors
///
/// - `TemplateLocked` if the template is referenced by an assignment
/// - Any resolution error for the new CTC or overrides
pub fn update_template(
    data: &mut TenantData,
    template_id: Uuid,
    changes: TemplateChanges,
    defaults: &CompensationDefaults,
) -> EngineResult<CompensationTemplate> {
    let current = data.template(template_id)?;
    if changes.is_empty() {
        return Ok(current.clone());
    }
    if current.locked {
        return Err(EngineError::TemplateLocked { template_id });
    }
    if let Some(name) = &changes.name {
        if name.trim().is_empty() {
            return Err(EngineError::validation("name", "must not be empty"));
        }
    }

    let annual_ctc = changes.annual_ctc.unwrap_or(current.annual_ctc);
    let overrides = changes
        .overrides
        .unwrap_or_else(|| current.overrides.clone());
    let breakdown = resolve(annual_ctc, &overrides, defaults)?;

    let template = data
        .templates
        .get_mut(&template_id)
        .ok_or_else(|| EngineError::not_found("Template", template_id))?;
    if let Some(name) = changes.name {
        template.name = name.trim().to_string();
    }
    template.annual_ctc = breakdown.annual_ctc;
    template.monthly_ctc = round_currency(breakdown.annual_ctc / Decimal::from(12));
    template.overrides = overrides;
    template.breakdown = breakdown;
    template.updated_at = Utc::now();
    Ok(template.clone())
}
