//! # Message Rendering
//!
//! Turns a classified event into the user-facing push text. Templates are
//! keyed by wire code (not topic) because sibling codes of one topic have
//! different payload shapes and different texts.
//!
//! Rendering is a collaborator behind [`EventRenderer`]; a failure here is
//! caught by the router and isolated to the one subscriber it was for.

use chrono::{Local, TimeZone};
use serde_json::Value;

use crate::core::classifier::ClassifiedEvent;
use crate::core::model::RenderError;

/// Renders a classified event into a finished message for one subscriber.
///
/// `locality` is the subscriber's display server name, used for the
/// message banner.
pub trait EventRenderer: Send + Sync {
    /// Produces the full message text, or fails if the payload is missing
    /// fields the template requires.
    fn render(&self, event: &ClassifiedEvent, locality: &str) -> Result<String, RenderError>;
}

/// The default template set for the JX3 push feed.
#[derive(Debug, Default)]
pub struct TemplateRenderer;

impl TemplateRenderer {
    /// Creates the default renderer.
    pub fn new() -> Self {
        Self
    }
}

impl EventRenderer for TemplateRenderer {
    fn render(&self, event: &ClassifiedEvent, locality: &str) -> Result<String, RenderError> {
        let body = render_body(&event.code, &event.payload)?;
        Ok(format!(
            "[ 剑网3推送 · {} ]\n----------------------\n{}",
            locality, body
        ))
    }
}

/// A required string field of the payload.
fn req<'a>(data: &'a Value, key: &'static str) -> Result<&'a str, RenderError> {
    data.get(key)
        .and_then(Value::as_str)
        .ok_or(RenderError::MissingField(key))
}

fn render_body(code: &str, data: &Value) -> Result<String, RenderError> {
    let body = match code {
        // --- 奇遇 ---
        "1001" => format!(
            "✨ 奇遇报时\n【{}】触发了《{}》",
            req(data, "name")?,
            req(data, "event")?
        ),

        // --- 刷马/抓马 ---
        "1002" => format!(
            "🐎 刷马预告\n约5~10分钟后有宝马良驹在【{}】出没",
            req(data, "map_name")?
        ),
        "1003" => format!(
            "🐎 抓马快讯\n【{}】的【{}】被【{}】抓走了",
            req(data, "map_name")?,
            req(data, "horse")?,
            req(data, "name")?
        ),

        // --- 扶摇 ---
        "1004" => {
            let when = data
                .get("time")
                .and_then(Value::as_i64)
                .and_then(|secs| Local.timestamp_opt(secs, 0).single())
                .map(|t| t.format("%H:%M:%S").to_string())
                .unwrap_or_else(|| "近期".to_string());
            format!("☁️ 扶摇预告\n梅花桩试炼将在 {} 开始", when)
        }
        "1005" => "☁️ 扶摇开始\n梅花桩试炼已经开始啦，侠士速去！".to_string(),
        "1006" => {
            let names = match data.get("name").and_then(Value::as_array) {
                Some(list) => list
                    .iter()
                    .filter_map(Value::as_str)
                    .collect::<Vec<_>>()
                    .join("、"),
                None => String::new(),
            };
            let names = if names.is_empty() {
                "各位侠士".to_string()
            } else {
                names
            };
            format!("☁️ 扶摇结束\n梅花桩试炼已结束。请【{}】快去找唐文羽！", names)
        }

        // --- 烟花/玄晶 ---
        "1007" => format!(
            "🎆 烟花报时\n{} 在 {} 为 {} 燃放了【{}】！",
            req(data, "sender")?,
            req(data, "map_name")?,
            req(data, "receive")?,
            req(data, "name")?
        ),
        "1008" => format!(
            "💎 玄晶报时\n恭喜【{}】在 {} 获得了【{}】！",
            req(data, "role_name")?,
            req(data, "map_name")?,
            req(data, "name")?
        ),

        // --- 追魂/诛恶 ---
        "1009" => format!(
            "🎯 追魂点名\n请 [{}·{}] 侠士速来 {}，有要事相商！",
            req(data, "name")?,
            req(data, "subserver")?,
            req(data, "realm")?
        ),
        "1010" => format!(
            "⚔️ 诛恶事件\n诛恶事件触发！侠士可前往【{}】一探究竟。",
            req(data, "map_name")?
        ),

        // --- 的卢 ---
        "1012" => format!(
            "🏇 的卢刷新\n的卢在 {} 现身，众侠士可前往捕获。",
            req(data, "map_name")?
        ),
        "1013" => format!(
            "🏇 的卢捕获\n侠士【{}】在 {} 捕获了马驹【{}】",
            req(data, "role_name")?,
            req(data, "map_name")?,
            req(data, "name")?
        ),
        "1014" => format!(
            "🏇 的卢拍卖\n侠士【{}】以 {} 获得了马驹【{}】",
            req(data, "role_name")?,
            req(data, "amount")?,
            req(data, "name")?
        ),

        // --- 宣战 ---
        "1108" | "1109" => format!(
            "🚩 帮会宣战\n【{}】向【{}】发起了{}小时的野外宣战！",
            req(data, "tong_a_name")?,
            req(data, "tong_b_name")?,
            data.get("hour").map(fmt_scalar).unwrap_or_default()
        ),
        "1110" | "1111" => format!(
            "🚩 领地宣战\n【{}】向【{}】发起了领地宣战，战场：{}",
            req(data, "tong_a_name")?,
            req(data, "tong_b_name")?,
            req(data, "tong_map_name")?
        ),

        // --- 系统/新闻 ---
        "2001" => {
            let status = if data.get("status").and_then(Value::as_i64) == Some(1) {
                "开服"
            } else {
                "维护"
            };
            format!("⚙️ 服务器状态\n【{}】当前已 {}。", req(data, "server")?, status)
        }
        "2002" => format!(
            "📰 官方新闻\n标题：{}\n链接：{}",
            req(data, "title")?,
            req(data, "url")?
        ),
        "2003" => format!(
            "🔧 游戏更新\n检测到新版本：{}\n更新包大小：{}",
            data.get("new_version").map(fmt_scalar).unwrap_or_default(),
            data.get("package_size").map(fmt_scalar).unwrap_or_default()
        ),
        "2004" => format!(
            "💬 八卦速报\n{}\n来自：{}吧\n链接：{}",
            req(data, "title")?,
            req(data, "name")?,
            req(data, "url")?
        ),

        // Codes the classifier accepts but no template covers yet.
        other => data
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| format!("收到事件消息(Code: {})", other)),
    };
    Ok(body)
}

/// Formats a scalar payload value without JSON string quoting.
fn fmt_scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
