//! 跳过标记：对象注解值解析为 true 时，不复制到 Store

use crate::resource::ObjectMeta;

/// 默认的跳过标记注解键
pub const DEFAULT_SKIP_ANNOTATION: &str = "no-gitops-sync";

/// 跳过标记
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkipMarker {
    annotation: String,
}

impl SkipMarker {
    pub fn new(annotation: impl Into<String>) -> Self {
        Self {
            annotation: annotation.into(),
        }
    }

    pub fn annotation(&self) -> &str {
        &self.annotation
    }

    /// 对象是否声明跳过同步；缺失、空值或无法解析都视为 false
    pub fn is_set(&self, meta: &ObjectMeta) -> bool {
        meta.annotations
            .get(&self.annotation)
            .and_then(|value| parse_bool(value))
            .unwrap_or(false)
    }
}

impl Default for SkipMarker {
    fn default() -> Self {
        Self::new(DEFAULT_SKIP_ANNOTATION)
    }
}

/// 标准布尔文本解析（不做 trim，大小写只接受以下几种写法）
pub fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn meta_with(value: Option<&str>) -> ObjectMeta {
        let meta = ObjectMeta::new("wf", Utc::now());
        match value {
            Some(v) => meta.with_annotation(DEFAULT_SKIP_ANNOTATION, v),
            None => meta,
        }
    }

    #[test]
    fn parse_bool_vocabulary() {
        for v in ["1", "t", "T", "true", "TRUE", "True"] {
            assert_eq!(parse_bool(v), Some(true), "{}", v);
        }
        for v in ["0", "f", "F", "false", "FALSE", "False"] {
            assert_eq!(parse_bool(v), Some(false), "{}", v);
        }
        for v in ["", "yes", "tRuE", " true", "2"] {
            assert_eq!(parse_bool(v), None, "{:?}", v);
        }
    }

    #[test]
    fn marker_true_values() {
        let marker = SkipMarker::default();
        assert!(marker.is_set(&meta_with(Some("true"))));
        assert!(marker.is_set(&meta_with(Some("1"))));
    }

    #[test]
    fn marker_absent_empty_or_garbage_is_false() {
        let marker = SkipMarker::default();
        assert!(!marker.is_set(&meta_with(None)));
        assert!(!marker.is_set(&meta_with(Some(""))));
        assert!(!marker.is_set(&meta_with(Some("definitely"))));
        assert!(!marker.is_set(&meta_with(Some("false"))));
    }

    #[test]
    fn custom_annotation_key() {
        let marker = SkipMarker::new("example.io/skip");
        let meta = ObjectMeta::new("wf", Utc::now()).with_annotation("example.io/skip", "T");
        assert!(marker.is_set(&meta));
        assert!(!SkipMarker::default().is_set(&meta));
    }
}
