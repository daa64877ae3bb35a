//! Cache key wire format.
//!
//! ```text
//! {address}{user}{name1=val1,name2=val2}
//! ```
//!
//! The user segment only appears for user-scoped rules that have a user, and
//! the parameter segment only when there are parameters. Parameters are sorted
//! by name; array values are sorted and flattened into repeated `name=value`
//! pairs. Keys written by an external backend outlive the process, so this
//! format must stay stable.
//!
//! # Known limits
//!
//! The format is not injective, and fixing that would orphan every stored key:
//!
//! - Strings render without quotes, so `"1"` and `1` (or `"true"` and `true`)
//!   share a key.
//! - Segments are not tagged or escaped. A user named `a=1` produces the same
//!   key as no user with a single parameter `a=1`, and braces or commas inside
//!   values can shift segment boundaries.
//!
//! Handlers whose results differ for such inputs should not share a cache
//! rule, or should use distinct parameter names.

use crate::requester::Requester;
use crate::rules::CacheScope;
use serde_json::Value;
use std::collections::BTreeMap;

/// Builds the cache key for `requester` under `scope`.
pub fn cache_key(requester: &Requester, scope: CacheScope) -> String {
    let mut key = format!("{{{}}}", requester.address());

    if scope == CacheScope::User {
        if let Some(user) = requester.user().filter(|u| !u.is_empty()) {
            key.push('{');
            key.push_str(user);
            key.push('}');
        }
    }

    let sorted: BTreeMap<&str, &Value> = requester
        .params()
        .iter()
        .map(|(k, v)| (k.as_str(), v))
        .collect();
    if !sorted.is_empty() {
        let pairs: Vec<String> = sorted
            .into_iter()
            .flat_map(|(name, value)| render_pairs(name, value))
            .collect();
        key.push('{');
        key.push_str(&pairs.join(","));
        key.push('}');
    }

    key
}

/// Pattern matching every key stored for `address`, across users and parameters.
pub fn namespace(address: &str) -> String {
    format!("{{{address}}}*")
}

fn render_pairs(name: &str, value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) if !items.is_empty() => {
            let mut rendered: Vec<String> = items.iter().map(render_value).collect();
            rendered.sort();
            rendered.into_iter().map(|v| format!("{name}={v}")).collect()
        }
        Value::Array(_) => vec![format!("{name}=")],
        other => vec![format!("{name}={}", render_value(other))],
    }
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        // Objects serialize with sorted keys, so nested maps are stable too.
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_param_order_does_not_matter() {
        let a = Requester::new("/x").with_param("b", 2).with_param("a", 1);
        let b = Requester::new("/x").with_param("a", 1).with_param("b", 2);
        assert_eq!(cache_key(&a, CacheScope::Global), cache_key(&b, CacheScope::Global));
        assert_eq!(cache_key(&a, CacheScope::Global), "{/x}{a=1,b=2}");
    }

    #[test]
    fn test_segments_omitted_when_empty() {
        let r = Requester::new("/x");
        assert_eq!(cache_key(&r, CacheScope::Global), "{/x}");
        assert_eq!(cache_key(&r, CacheScope::User), "{/x}");
    }

    #[test]
    fn test_user_segment_only_for_user_scope() {
        let r = Requester::new("/x").with_user("alice").with_param("q", "rust");
        assert_eq!(cache_key(&r, CacheScope::User), "{/x}{alice}{q=rust}");
        assert_eq!(cache_key(&r, CacheScope::Global), "{/x}{q=rust}");
    }

    #[test]
    fn test_arrays_sorted_and_flattened() {
        let a = Requester::new("/x").with_param("tag", json!(["b", "a"]));
        let b = Requester::new("/x").with_param("tag", json!(["a", "b"]));
        assert_eq!(cache_key(&a, CacheScope::Global), "{/x}{tag=a,tag=b}");
        assert_eq!(cache_key(&a, CacheScope::Global), cache_key(&b, CacheScope::Global));
    }

    #[test]
    fn test_distinct_params_give_distinct_keys() {
        let keys: Vec<String> = [
            Requester::new("/x"),
            Requester::new("/x").with_param("a", 1),
            Requester::new("/x").with_param("a", 2),
            Requester::new("/x").with_param("b", 1),
            Requester::new("/x").with_param("a", 1).with_param("b", 1),
            Requester::new("/y").with_param("a", 1),
        ]
        .iter()
        .map(|r| cache_key(r, CacheScope::Global))
        .collect();

        let unique: std::collections::HashSet<&String> = keys.iter().collect();
        assert_eq!(unique.len(), keys.len());
    }

    #[test]
    fn test_namespace_covers_all_keys_of_address() {
        let r = Requester::new("/report").with_user("u").with_param("y", 1);
        let key = cache_key(&r, CacheScope::User);
        assert!(crate::pattern::matches(&namespace("/report"), &key));
        assert!(!crate::pattern::matches(&namespace("/rep"), &key));
    }

    #[test]
    fn test_string_and_number_share_a_key() {
        let text = Requester::new("/n").with_param("id", "1");
        let number = Requester::new("/n").with_param("id", 1);
        assert_eq!(
            cache_key(&text, CacheScope::Global),
            cache_key(&number, CacheScope::Global)
        );
    }

    #[test]
    fn test_user_segment_can_look_like_parameters() {
        let user = Requester::new("/n").with_user("a=1");
        let param = Requester::new("/n").with_param("a", 1);
        assert_eq!(cache_key(&user, CacheScope::User), "{/n}{a=1}");
        assert_eq!(cache_key(&param, CacheScope::User), "{/n}{a=1}");
    }
}
