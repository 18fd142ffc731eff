//! # Event Classifier
//!
//! Maps raw frames from the upstream push feed onto the fixed [`Topic`]
//! taxonomy. Several wire codes collapse onto one topic on purpose: the
//! per-group toggle granularity is the topic, not the wire code (e.g. the
//! spawn, capture and auction codes of the 的卢 horse are all one toggle).
//!
//! Frames with a malformed shape or an unknown code are dropped here.
//! That is expected steady-state noise, not a fault, so it is logged at
//! debug level only.

use serde::Deserialize;
use serde_json::Value;

/// One subscriber-facing push category.
///
/// The set is fixed; the variants carry no payload so the enum stays `Copy`
/// and can be used as a plain key. `label()` is the canonical Chinese name
/// used both for display and as the key of the persisted toggle map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// 奇遇报时, rare serendipity triggers.
    Serendipity,
    /// 抓马, wild horse spawn/capture events.
    HorseEvent,
    /// 扶摇, the 扶摇九天 trial window.
    Fuyao,
    /// 烟花, firework launches.
    Fireworks,
    /// 玄晶报时, 玄晶 drops.
    Xuanjing,
    /// 追魂点名, the soul-summon call-out.
    SoulSummon,
    /// 诛恶事件, evil-slaying world events.
    EvilPunish,
    /// 的卢, 的卢 horse spawn/capture/auction.
    Dilu,
    /// 前线战况, faction frontline reports (no wire code in this feed version).
    Frontline,
    /// 帮会宣战, guild war declarations.
    GuildWar,
    /// 领地宣战, territory war declarations.
    TerritoryWar,
    /// 开服报时, server open/maintenance status.
    ServerStatus,
    /// 新闻资讯, official news.
    News,
    /// 游戏更新, client update notices.
    GameUpdate,
    /// 八卦速报, forum gossip digest.
    Gossip,
    /// 关隘首领, pass boss spawns (no wire code in this feed version).
    PassBoss,
    /// 云丛预告, 云从 forecast (no wire code in this feed version).
    CloudForecast,
}

impl Topic {
    /// Every topic, in display order.
    pub const ALL: [Topic; 17] = [
        Topic::Serendipity,
        Topic::HorseEvent,
        Topic::Fuyao,
        Topic::Fireworks,
        Topic::Xuanjing,
        Topic::SoulSummon,
        Topic::EvilPunish,
        Topic::Dilu,
        Topic::Frontline,
        Topic::GuildWar,
        Topic::TerritoryWar,
        Topic::ServerStatus,
        Topic::News,
        Topic::GameUpdate,
        Topic::Gossip,
        Topic::PassBoss,
        Topic::CloudForecast,
    ];

    /// Canonical Chinese label. Also the key of the persisted toggle map.
    pub fn label(self) -> &'static str {
        match self {
            Topic::Serendipity => "奇遇报时",
            Topic::HorseEvent => "抓马",
            Topic::Fuyao => "扶摇",
            Topic::Fireworks => "烟花",
            Topic::Xuanjing => "玄晶报时",
            Topic::SoulSummon => "追魂点名",
            Topic::EvilPunish => "诛恶事件",
            Topic::Dilu => "的卢",
            Topic::Frontline => "前线战况",
            Topic::GuildWar => "帮会宣战",
            Topic::TerritoryWar => "领地宣战",
            Topic::ServerStatus => "开服报时",
            Topic::News => "新闻资讯",
            Topic::GameUpdate => "游戏更新",
            Topic::Gossip => "八卦速报",
            Topic::PassBoss => "关隘首领",
            Topic::CloudForecast => "云丛预告",
        }
    }

    /// Resolves a canonical label back to its topic.
    pub fn from_label(label: &str) -> Option<Topic> {
        Topic::ALL.iter().copied().find(|t| t.label() == label)
    }

    /// Resolves the short alias used by the toggle command surface
    /// (e.g. `奇遇` → 奇遇报时). Canonical labels are accepted too.
    pub fn from_alias(alias: &str) -> Option<Topic> {
        let topic = match alias {
            "奇遇" => Topic::Serendipity,
            "抓马" => Topic::HorseEvent,
            "扶摇" => Topic::Fuyao,
            "烟花" => Topic::Fireworks,
            "玄晶" => Topic::Xuanjing,
            "追魂" => Topic::SoulSummon,
            "诛恶" => Topic::EvilPunish,
            "的卢" => Topic::Dilu,
            "前线" => Topic::Frontline,
            "帮战" => Topic::GuildWar,
            "领战" => Topic::TerritoryWar,
            "开服" => Topic::ServerStatus,
            "新闻" => Topic::News,
            "更新" => Topic::GameUpdate,
            "八卦" => Topic::Gossip,
            "关隘" => Topic::PassBoss,
            "云丛" => Topic::CloudForecast,
            other => return Topic::from_label(other),
        };
        Some(topic)
    }

    /// The fixed code→topic table. Codes map many-to-one.
    pub fn from_code(code: &str) -> Option<Topic> {
        let topic = match code {
            "1001" => Topic::Serendipity,
            "1002" | "1003" => Topic::HorseEvent,
            "1004" | "1005" | "1006" => Topic::Fuyao,
            "1007" => Topic::Fireworks,
            "1008" => Topic::Xuanjing,
            "1009" => Topic::SoulSummon,
            "1010" => Topic::EvilPunish,
            "1012" | "1013" | "1014" => Topic::Dilu,
            "1108" | "1109" => Topic::GuildWar,
            "1110" | "1111" => Topic::TerritoryWar,
            "2001" => Topic::ServerStatus,
            "2002" => Topic::News,
            "2003" => Topic::GameUpdate,
            "2004" => Topic::Gossip,
            _ => return None,
        };
        Some(topic)
    }
}

/// Delivery scope of a classified event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventScope {
    /// No locality association; delivered to every topic-enabled group.
    Global,
    /// Bound to one game server; delivered only to groups bound to it.
    Scoped(String),
}

/// A validated, classified push event ready for routing.
#[derive(Debug, Clone)]
pub struct ClassifiedEvent {
    /// The normalized wire code (e.g. `"1001"`). Kept for template lookup.
    pub code: String,
    /// The resolved topic.
    pub topic: Topic,
    /// Global, or scoped to one game server.
    pub scope: EventScope,
    /// The opaque payload as sent by the upstream producer.
    pub payload: Value,
}

/// Raw frame shape on the wire: `{"code": <int|string>, "data": {...}}`.
#[derive(Debug, Deserialize)]
struct RawFrame {
    code: Option<Value>,
    #[serde(default)]
    data: Value,
}

/// Classifies one raw text frame.
///
/// Returns `None` for malformed frames and unknown codes. Both are
/// dropped silently, with a debug log only.
pub fn classify(text: &str) -> Option<ClassifiedEvent> {
    let raw: RawFrame = match serde_json::from_str(text) {
        Ok(raw) => raw,
        Err(e) => {
            log::debug!("Dropping malformed frame: {}", e);
            return None;
        }
    };

    // The upstream feed is inconsistent about the code type; normalize to a string.
    let code = match raw.code {
        Some(Value::String(s)) => s,
        Some(Value::Number(n)) => n.to_string(),
        _ => {
            log::debug!("Dropping frame without a usable code");
            return None;
        }
    };

    let Some(topic) = Topic::from_code(&code) else {
        log::debug!("Dropping frame with unrecognized code {}", code);
        return None;
    };

    // A `server` field in the payload scopes the event to that game server.
    // Its absence means the event is global and bypasses the locality filter.
    let scope = match raw.data.get("server").and_then(Value::as_str) {
        Some(server) => EventScope::Scoped(server.to_string()),
        None => EventScope::Global,
    };

    Some(ClassifiedEvent {
        code,
        topic,
        scope,
        payload: raw.data,
    })
}
