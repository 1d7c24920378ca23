//! Engine tuning profiles and the logical-name → engine-call lookup table

use serde::{Deserialize, Serialize};

/// Scan intensity profile
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanMode {
    /// Fewer threads, shorter caps, low attack strength
    Fast,
    #[default]
    Normal,
}

impl ScanMode {
    /// Parse a mode name; unknown names fall back to `Normal`
    pub fn parse(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "fast" | "quick" => ScanMode::Fast,
            _ => ScanMode::Normal,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ScanMode::Fast => "fast",
            ScanMode::Normal => "normal",
        }
    }

    /// Ordered settings applied by `configure`
    pub fn settings(&self) -> Vec<Setting> {
        let (spider_threads, spider_mins, spider_children) = match self {
            ScanMode::Fast => (3, 2, 10),
            ScanMode::Normal => (5, 5, 20),
        };
        let (per_host, hosts, delay, rule_mins, scan_mins, strength, timeout) = match self {
            ScanMode::Fast => (2, 1, 200, 1, 5, "LOW", 20),
            ScanMode::Normal => (3, 2, 100, 2, 10, "MEDIUM", 30),
        };

        vec![
            Setting::new("spider.thread_count", spider_threads),
            Setting::new("spider.max_duration_mins", spider_mins),
            Setting::new("spider.max_children", spider_children),
            Setting::new("ascan.thread_per_host", per_host),
            Setting::new("ascan.host_per_scan", hosts),
            Setting::new("ascan.delay_ms", delay),
            Setting::new("ascan.max_rule_duration_mins", rule_mins),
            Setting::new("ascan.max_scan_duration_mins", scan_mins),
            Setting::new("ascan.attack_strength", strength),
            Setting::new("connection.timeout_secs", timeout),
        ]
    }
}

impl std::fmt::Display for ScanMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named engine setting with its value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Setting {
    pub name: String,
    pub value: String,
}

impl Setting {
    pub fn new(name: impl Into<String>, value: impl ToString) -> Self {
        Self {
            name: name.into(),
            value: value.to_string(),
        }
    }
}

/// One concrete control-API call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineCall {
    pub component: &'static str,
    pub action: String,
    pub params: Vec<(String, String)>,
}

impl EngineCall {
    fn option(component: &'static str, option: &str, param: &str, value: &str) -> Self {
        Self {
            component,
            action: format!("setOption{}", option),
            params: vec![(param.to_string(), value.to_string())],
        }
    }
}

/// Scan policy categories the attack strength is applied to
const POLICY_CATEGORIES: [u8; 5] = [0, 1, 2, 3, 4];

/// Resolve a logical setting to the engine calls implementing it.
/// Returns `None` for unmapped names.
pub fn lookup(setting: &Setting) -> Option<Vec<EngineCall>> {
    let v = setting.value.as_str();
    let calls = match setting.name.as_str() {
        "spider.thread_count" => vec![EngineCall::option("spider", "ThreadCount", "Integer", v)],
        "spider.max_depth" => vec![EngineCall::option("spider", "MaxDepth", "Integer", v)],
        "spider.max_duration_mins" => vec![EngineCall::option("spider", "MaxDuration", "Integer", v)],
        "spider.max_children" => vec![EngineCall::option("spider", "MaxChildren", "Integer", v)],
        "ascan.thread_per_host" => vec![EngineCall::option("ascan", "ThreadPerHost", "Integer", v)],
        "ascan.host_per_scan" => vec![EngineCall::option("ascan", "HostPerScan", "Integer", v)],
        "ascan.delay_ms" => vec![EngineCall::option("ascan", "DelayInMs", "Integer", v)],
        "ascan.max_rule_duration_mins" => {
            vec![EngineCall::option("ascan", "MaxRuleDurationInMins", "Integer", v)]
        }
        "ascan.max_scan_duration_mins" => {
            vec![EngineCall::option("ascan", "MaxScanDurationInMins", "Integer", v)]
        }
        "ascan.attack_strength" => POLICY_CATEGORIES
            .iter()
            .map(|id| EngineCall {
                component: "ascan",
                action: String::from("setPolicyAttackStrength"),
                params: vec![
                    ("id".to_string(), id.to_string()),
                    ("attackStrength".to_string(), v.to_ascii_uppercase()),
                ],
            })
            .collect(),
        "connection.timeout_secs" => vec![EngineCall::option("core", "TimeoutInSecs", "Integer", v)],
        _ => return None,
    };
    Some(calls)
}

/// Generic attempts for an unmapped setting, tried in order until one
/// succeeds: `setOption<Name>` on core, spider and ascan.
pub fn fallback_calls(setting: &Setting) -> Vec<EngineCall> {
    let option = option_name(&setting.name);
    let param = param_kind(&setting.value);
    ["core", "spider", "ascan"]
        .into_iter()
        .map(|component| EngineCall::option(component, &option, param, &setting.value))
        .collect()
}

/// `ascan.max_results_to_list` → `MaxResultsToList`
fn option_name(name: &str) -> String {
    let last = name.rsplit('.').next().unwrap_or(name);
    last.split(|c| c == '_' || c == '-')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect()
}

fn param_kind(value: &str) -> &'static str {
    if value.parse::<i64>().is_ok() {
        "Integer"
    } else if value.eq_ignore_ascii_case("true") || value.eq_ignore_ascii_case("false") {
        "Boolean"
    } else {
        "String"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_profile_setting_is_mapped() {
        for mode in [ScanMode::Fast, ScanMode::Normal] {
            for setting in mode.settings() {
                assert!(lookup(&setting).is_some(), "{} unmapped", setting.name);
            }
        }
    }

    #[test]
    fn test_lookup_builds_option_call() {
        let calls = lookup(&Setting::new("ascan.delay_ms", 250)).unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].component, "ascan");
        assert_eq!(calls[0].action, "setOptionDelayInMs");
        assert_eq!(calls[0].params, vec![("Integer".to_string(), "250".to_string())]);
    }

    #[test]
    fn test_attack_strength_fans_out() {
        let calls = lookup(&Setting::new("ascan.attack_strength", "low")).unwrap();
        assert_eq!(calls.len(), POLICY_CATEGORIES.len());
        assert!(calls
            .iter()
            .all(|c| c.params.contains(&("attackStrength".to_string(), "LOW".to_string()))));
    }

    #[test]
    fn test_fallback_calls_for_unmapped() {
        let setting = Setting::new("ascan.max_results_to_list", 1000);
        assert!(lookup(&setting).is_none());

        let calls = fallback_calls(&setting);
        let components: Vec<_> = calls.iter().map(|c| c.component).collect();
        assert_eq!(components, vec!["core", "spider", "ascan"]);
        assert_eq!(calls[0].action, "setOptionMaxResultsToList");
        assert_eq!(calls[0].params[0].0, "Integer");

        let flag = fallback_calls(&Setting::new("spider.parse_comments", "true"));
        assert_eq!(flag[1].action, "setOptionParseComments");
        assert_eq!(flag[1].params[0].0, "Boolean");
    }

    #[test]
    fn test_mode_parse() {
        assert_eq!(ScanMode::parse("FAST"), ScanMode::Fast);
        assert_eq!(ScanMode::parse("thorough"), ScanMode::Normal);
        assert_eq!(ScanMode::Fast.to_string(), "fast");
    }
}
