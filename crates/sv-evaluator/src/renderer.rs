//! Message Renderer (C6): a minimal mustache-style variable-substitution
//! engine.
//!
//! The source uses a full template engine; per the redesign notes this is
//! re-architected as plain `{{variable}}` interpolation over a fixed set
//! of fields — every field of the alert, every field of the evaluated
//! `SignalReading`, and the synthesized `direction` field. Richer
//! constructs (conditionals, loops, partials) are out of scope.

use std::collections::HashMap;

use sv_common::{Alert, AlertingError, Result, SignalReading};

/// Expands `alert.message` against `alert`'s own fields plus `reading`'s.
pub fn render(alert: &Alert, reading: &SignalReading) -> Result<String> {
    let vars = build_vars(alert, reading);
    expand(&alert.message, &vars)
}

fn build_vars(alert: &Alert, reading: &SignalReading) -> HashMap<&'static str, String> {
    let mut vars = HashMap::new();
    vars.insert("id", alert.id.clone());
    vars.insert("signal", alert.condition.signal.clone());
    vars.insert("difference", alert.condition.difference.to_string());
    vars.insert("timeframe", alert.condition.timeframe.as_secs().to_string());
    vars.insert("message", alert.message.clone());
    vars.insert("room", alert.room.clone().unwrap_or_default());
    vars.insert("poll_rate", alert.poll_rate.to_string());
    vars.insert("strategy", format!("{:?}", alert.strategy));
    vars.insert("first", format_value(reading.first));
    vars.insert("last", format_value(reading.last));
    vars.insert("increased", reading.increased.to_string());
    vars.insert("diff", reading.diff.to_string());
    vars.insert("direction", reading.direction().to_string());
    vars
}

fn format_value(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{v:.0}")
    } else {
        format!("{v}")
    }
}

/// Scans `template` for `{{ key }}` placeholders (whitespace around the
/// key is trimmed) and substitutes each from `vars`. An unrecognized key
/// or an unterminated placeholder is a render failure — the caller drops
/// the delivery rather than sending a half-rendered message.
fn expand(template: &str, vars: &HashMap<&'static str, String>) -> Result<String> {
    let mut output = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        output.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after.find("}}").ok_or_else(|| {
            AlertingError::MessageRejected("unterminated template placeholder".to_string())
        })?;
        let key = after[..end].trim();
        let value = vars.get(key).ok_or_else(|| {
            AlertingError::MessageRejected(format!("unknown template variable `{key}`"))
        })?;
        output.push_str(value);
        rest = &after[end + 2..];
    }
    output.push_str(rest);
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use sv_common::{DeviationCondition, SignalStrategy};

    fn test_alert(message: &str) -> Alert {
        Alert::new(
            DeviationCondition {
                signal: "server_load_1m".to_string(),
                timeframe: Duration::from_secs(60),
                difference: 50,
            },
            message.to_string(),
            Some("!ops:example.org".to_string()),
            None,
            60,
            SignalStrategy::OldestNewest,
        )
    }

    fn test_reading() -> SignalReading {
        SignalReading {
            first: 1.0,
            last: 2.5,
            increased: true,
            diff: 60,
        }
    }

    #[test]
    fn renders_documented_placeholders() {
        let alert = test_alert("{{signal}} moved {{diff}}% ({{direction}})");
        let rendered = render(&alert, &test_reading()).unwrap();
        assert_eq!(rendered, "server_load_1m moved 60% (up)");
    }

    #[test]
    fn trims_whitespace_inside_braces() {
        let alert = test_alert("{{ signal }}: {{ first }} -> {{ last }}");
        let rendered = render(&alert, &test_reading()).unwrap();
        assert_eq!(rendered, "server_load_1m: 1 -> 2.5");
    }

    #[test]
    fn rejects_unknown_variable() {
        let alert = test_alert("{{nonexistent}}");
        assert!(render(&alert, &test_reading()).is_err());
    }

    #[test]
    fn rejects_unterminated_placeholder() {
        let alert = test_alert("{{signal");
        assert!(render(&alert, &test_reading()).is_err());
    }

    #[test]
    fn template_without_placeholders_passes_through() {
        let alert = test_alert("static message, no interpolation");
        assert_eq!(
            render(&alert, &test_reading()).unwrap(),
            "static message, no interpolation"
        );
    }
}
