use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::api::models::zapping::ChannelInfo;

/// AI 响应的解析结果
#[derive(Debug, Clone, PartialEq)]
pub enum BannerParse {
    /// 从 JSON 中解析
    Json(ChannelInfo),
    /// JSON 解析失败，由关键词提取
    Fallback(ChannelInfo),
    Empty,
}

impl BannerParse {
    pub fn info(&self) -> Option<&ChannelInfo> {
        match self {
            BannerParse::Json(info) | BannerParse::Fallback(info) => Some(info),
            BannerParse::Empty => None,
        }
    }

    pub fn into_info(self) -> ChannelInfo {
        match self {
            BannerParse::Json(info) | BannerParse::Fallback(info) => info,
            BannerParse::Empty => ChannelInfo::default(),
        }
    }
}

const CHANNEL_KEYS: [&str; 2] = ["channel_name", "channel"];
const PROGRAM_KEYS: [&str; 4] = ["program_name", "program", "programme", "title"];
const START_KEYS: [&str; 2] = ["start_time", "start"];
const END_KEYS: [&str; 2] = ["end_time", "end"];

const PLACEHOLDERS: [&str; 9] = [
    "", "null", "none", "n/a", "na", "unknown", "unclear", "-", "not visible",
];

static CHANNEL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?im)\bchannel(?:[ _]?name)?["']?\s*(?:[:=]|\bis\b|-)\s*["']?([^"'\n,;{}]+)"#)
        .expect("valid channel pattern")
});

static PROGRAM_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?im)\b(?:program(?:me)?|show|title)(?:[ _]?name)?["']?\s*(?:[:=]|\bis\b|-)\s*["']?([^"'\n,;{}]+)"#,
    )
    .expect("valid program pattern")
});

static START_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?im)\bstart(?:s|ing)?(?:[ _]?time)?["']?\s*(?:[:=]|\bis\b|-|at)\s*["']?(\d{1,2}[:.h]\d{2}(?:\s*[ap]m)?)"#)
        .expect("valid start pattern")
});

static END_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?im)\bend(?:s|ing)?(?:[ _]?time)?["']?\s*(?:[:=]|\bis\b|-|at)\s*["']?(\d{1,2}[:.h]\d{2}(?:\s*[ap]m)?)"#)
        .expect("valid end pattern")
});

static RANGE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(\d{1,2}:\d{2})\s*(?:-|–|to)\s*(\d{1,2}:\d{2})\b").expect("valid range pattern")
});

/// 解析 AI 返回文本：优先 JSON，失败后按关键词提取
pub fn parse_banner_response(text: &str) -> BannerParse {
    if let Some(value) = parse_json_payload(text) {
        let info = info_from_json(&value);
        debug!("🧾 Banner JSON parsed: {:?}", info);
        return if info.is_empty() {
            BannerParse::Empty
        } else {
            BannerParse::Json(info)
        };
    }

    let info = extract_from_text(text);
    debug!("🔎 Banner fallback extraction: {:?}", info);
    if info.is_empty() {
        BannerParse::Empty
    } else {
        BannerParse::Fallback(info)
    }
}

/// 截取响应中第一个 `{` 到最后一个 `}` 之间的内容（兼容代码块与前后说明文字）
fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    Some(&text[start..=end])
}

fn parse_json_payload(text: &str) -> Option<Value> {
    let candidate = extract_json_object(text)?;
    let value = serde_json::from_str::<Value>(candidate)
        .ok()
        .or_else(|| json5::from_str::<Value>(candidate).ok())?;

    if value.is_object() {
        Some(value)
    } else {
        None
    }
}

fn info_from_json(value: &Value) -> ChannelInfo {
    let field = |keys: &[&str]| {
        keys.iter()
            .filter_map(|k| value.get(*k))
            .find_map(|v| match v {
                Value::String(s) => clean_json_value(s),
                Value::Number(n) => clean_json_value(&n.to_string()),
                _ => None,
            })
    };

    ChannelInfo {
        channel_name: field(&CHANNEL_KEYS[..]),
        program_name: field(&PROGRAM_KEYS[..]),
        start_time: field(&START_KEYS[..]),
        end_time: field(&END_KEYS[..]),
    }
}

fn extract_from_text(text: &str) -> ChannelInfo {
    let capture = |re: &Regex| {
        re.captures_iter(text)
            .filter_map(|caps| caps.get(1))
            .find_map(|m| normalize(m.as_str()))
    };

    let mut info = ChannelInfo {
        channel_name: capture(&*CHANNEL_RE),
        program_name: capture(&*PROGRAM_RE),
        start_time: capture(&*START_RE),
        end_time: capture(&*END_RE),
    };

    if info.start_time.is_none() || info.end_time.is_none() {
        if let Some(caps) = RANGE_RE.captures(text) {
            info.start_time = info.start_time.or_else(|| normalize(&caps[1]));
            info.end_time = info.end_time.or_else(|| normalize(&caps[2]));
        }
    }

    info
}

/// JSON 字段值原样保留，仅去除首尾空白；占位值视为缺失
fn clean_json_value(raw: &str) -> Option<String> {
    let value = raw.trim();
    if is_placeholder(value) {
        None
    } else {
        Some(value.to_string())
    }
}

fn is_placeholder(value: &str) -> bool {
    PLACEHOLDERS.contains(&value.to_lowercase().as_str())
}

/// 自由文本捕获：截到首个句子、去除句末标点，占位值与否定描述视为缺失
fn normalize(raw: &str) -> Option<String> {
    let value = raw.split(". ").next().unwrap_or(raw);
    let value = value.trim().trim_end_matches(['.', '*']).trim();
    if is_placeholder(value) || value.to_lowercase().starts_with("not ") {
        None
    } else {
        Some(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_json() {
        let text = r#"{"channel_name":"BBC One","program_name":"News","start_time":"18:00","end_time":"18:30"}"#;
        let parsed = parse_banner_response(text);
        assert_eq!(
            parsed,
            BannerParse::Json(ChannelInfo {
                channel_name: Some("BBC One".into()),
                program_name: Some("News".into()),
                start_time: Some("18:00".into()),
                end_time: Some("18:30".into()),
            })
        );
    }

    #[test]
    fn test_json_wrapped_in_prose_and_fences() {
        let text = "Here is the banner data:\n```json\n{\"channel_name\": \"ZDF\", \"program_name\": null}\n```\nLet me know.";
        let parsed = parse_banner_response(text);
        match parsed {
            BannerParse::Json(info) => {
                assert_eq!(info.channel_name.as_deref(), Some("ZDF"));
                assert!(info.program_name.is_none());
            }
            other => panic!("expected JSON parse, got {:?}", other),
        }
    }

    #[test]
    fn test_lenient_json() {
        let text = "{'channel_name': 'RTL', 'start_time': '20:15',}";
        let info = parse_banner_response(text).into_info();
        assert_eq!(info.channel_name.as_deref(), Some("RTL"));
        assert_eq!(info.start_time.as_deref(), Some("20:15"));
    }

    #[test]
    fn test_json_values_kept_verbatim() {
        let text = r#"{"channel_name":"E! Ent.","program_name":"Dr. Who","start_time":" 21:00 ","end_time":"22:00"}"#;
        assert_eq!(
            parse_banner_response(text),
            BannerParse::Json(ChannelInfo {
                channel_name: Some("E! Ent.".into()),
                program_name: Some("Dr. Who".into()),
                start_time: Some("21:00".into()),
                end_time: Some("22:00".into()),
            })
        );

        let info = parse_banner_response(r#"{"channel_name":"BBC Two","program_name":"Not Going Out"}"#)
            .into_info();
        assert_eq!(info.channel_name.as_deref(), Some("BBC Two"));
        assert_eq!(info.program_name.as_deref(), Some("Not Going Out"));
    }

    #[test]
    fn test_placeholder_values_are_absent() {
        let text = r#"{"channel_name":"unknown","program_name":"N/A","start_time":"","end_time":null}"#;
        assert_eq!(parse_banner_response(text), BannerParse::Empty);
    }

    #[test]
    fn test_fallback_recovers_channel_name() {
        let text = "The banner shows Channel: BBC One. Program: News at Six, airing 18:00 - 18:30";
        match parse_banner_response(text) {
            BannerParse::Fallback(info) => {
                assert_eq!(info.channel_name.as_deref(), Some("BBC One"));
                assert_eq!(info.program_name.as_deref(), Some("News at Six"));
                assert_eq!(info.start_time.as_deref(), Some("18:00"));
                assert_eq!(info.end_time.as_deref(), Some("18:30"));
            }
            other => panic!("expected fallback parse, got {:?}", other),
        }
    }

    #[test]
    fn test_fallback_on_broken_json() {
        let text = r#"{"channel_name": "Canal+", "program_name": "Football"#;
        match parse_banner_response(text) {
            BannerParse::Fallback(info) => {
                assert_eq!(info.channel_name.as_deref(), Some("Canal+"));
                assert_eq!(info.program_name.as_deref(), Some("Football"));
            }
            other => panic!("expected fallback parse, got {:?}", other),
        }
    }

    #[test]
    fn test_channel_name_is_phrase() {
        let info = parse_banner_response("The channel name is \"Sky Sports\" and it starts at 19:30.")
            .into_info();
        assert_eq!(info.channel_name.as_deref(), Some("Sky Sports"));
        assert_eq!(info.start_time.as_deref(), Some("19:30"));
    }

    #[test]
    fn test_nothing_recoverable() {
        assert_eq!(
            parse_banner_response("I cannot read any text in this image."),
            BannerParse::Empty
        );
        assert_eq!(
            parse_banner_response("The channel is not visible."),
            BannerParse::Empty
        );
        assert!(parse_banner_response("").into_info().is_empty());
    }

    #[test]
    fn test_non_object_json_falls_back() {
        let parsed = parse_banner_response("[1, 2, 3]");
        assert_eq!(parsed, BannerParse::Empty);
    }
}
