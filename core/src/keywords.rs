//! Matching vocabularies, scanned in declaration order against lowercased text.
//! Chinese terms come from the chat communities the engine was first deployed
//! in and match anywhere. Latin terms must start a word ("sb" never fires
//! inside "husband"), but may run on, so stems like "harass" still match
//! "harassment".

use crate::classifier::{Behavior, PositiveTier};

/// Extreme abuse and threats of violence.
pub const SEVERE_KEYWORDS: &[&str] = &[
    "傻逼", "去死", "cnm", "nmsl", "死妈", "死全家", "人渣", "畜生", "杂种", "狗娘养",
    "弄死你", "打死你", "揍你",
    "kill yourself", "kys", "i will kill you", "i'll kill you", "die in a fire",
    "piece of shit",
];

/// Grumbling that deserves a small nudge, never an escalation.
pub const MILD_NEGATIVE_KEYWORDS: &[&str] = &[
    "有点烦", "有点烦人", "烦死了", "无语", "有点无语", "不太行", "不太好", "不太满意",
    "一般般", "就这", "有点尴尬", "不太对", "怪怪的", "emmm", "额...",
    "kinda annoying", "a bit annoying", "so annoying", "not great", "kinda weird",
    "is that all",
];

/// Insults and contempt aimed at the agent. Abbreviations that are also common
/// word prefixes ("nc", "low") are absent.
pub const NEGATIVE_KEYWORDS: &[&str] = &[
    "傻逼", "智障", "废物", "垃圾", "去死", "滚", "闭嘴", "sb", "cnm", "nmsl", "脑残",
    "白痴", "弱智", "傻子", "蠢货", "混蛋", "贱", "婊", "妈的", "狗东西", "死妈",
    "你妈死了", "全家", "祖宗", "死全家", "人渣", "败类", "畜生", "狗娘养", "杂种",
    "恶心", "讨厌你", "滚开", "消失", "死开", "脑子有病", "有病吧", "神经病", "变态",
    "恶心死了", "垃圾货", "废柴", "没用", "丢人", "丢脸", "蠢死了", "笨死了",
    "idiot", "stupid", "moron", "shut up", "useless", "garbage", "trash bot", "i hate you",
    "get lost", "screw you", "dumbass", "pathetic",
];

/// Apologies that soften an ordinary negative message.
pub const SOFTEN_NEGATIVE_KEYWORDS: &[&str] = &[
    "抱歉", "不好意思", "对不起", "失礼", "冒犯了", "打扰了", "抱怨下", "吐槽一下", "只是吐槽",
    "sorry", "my bad", "no offense", "apologies", "just venting", "just ranting",
];

/// Pet names and open affection: large positive delta.
pub const AFFECTIONATE_KEYWORDS: &[&str] = &[
    "咲夜姐姐", "咲夜妹妹", "咲夜学姐", "咲夜学妹", "咲夜酱", "小咲夜", "我家咲夜", "咲夜宝贝",
    "女仆长大人", "完美女仆长", "喜欢咲夜", "最喜欢咲夜", "爱咲夜", "好喜欢你", "最喜欢你",
    "爱你哦", "亲亲", "么么哒", "mua", "比心", "贴贴",
    "love you", "luv you", "adore you", "xoxo", "big hug", "hugs",
];

/// Thanks, praise, greetings and care.
pub const POSITIVE_KEYWORDS: &[&str] = &[
    "谢谢", "感谢", "谢谢你", "非常感谢", "太感谢了", "辛苦了", "感恩",
    "你真好", "你真棒", "学到了", "受教了", "佩服", "厉害", "好厉害", "太强了", "真棒", "棒棒哒",
    "晚安", "早安", "上午好", "下午好", "吃了吗",
    "赞", "好赞", "666", "可爱", "萌", "漂亮",
    "保重身体", "注意休息", "别太累", "加油",
    "thank you", "thanks", "thx", "appreciate it", "you're great", "well done", "great job",
    "amazing", "awesome", "good night", "good morning", "take care", "get some rest",
];

/// Phrases in the agent's reasoning that mean the message was not for it.
pub const NOT_TALKING_TO_ME_KEYWORDS: &[&str] = &[
    "不是在和我说话", "不是对我说的", "不是说给我", "不是跟我说", "与我无关", "跟我无关", "和我无关",
    "群友之间", "群友们在聊", "群友在讨论", "群友自己", "他们在聊", "他们之间", "他们自己",
    "别人的对话", "别人在聊", "别人的话题", "没有提到我", "没有叫我", "没有@我", "没有呼叫我",
    "不是针对我", "不需要我回复", "无需回复", "旁观", "围观", "看热闹", "吃瓜",
    "not talking to me", "not addressed to me", "not directed at me", "nothing to do with me",
    "between themselves", "side conversation", "didn't mention me", "did not mention me",
    "no reply needed", "no need to reply", "just observing",
];

/// Reasoning phrases naming a third party as the target of the behavior.
pub const REASONING_OTHERS_TARGET: &[&str] = &[
    "对他人", "对别人", "对群友", "对某人", "针对别人", "针对群友", "群友之间", "对他", "对她",
    "toward others", "towards others", "at another user", "at someone else", "toward another member",
    "against other members", "another member",
];

/// Uncertainty markers; a hedged behavior judgment is not scored.
pub const REASONING_HEDGE_KEYWORDS: &[&str] = &[
    "可能", "也许", "似乎", "推测", "猜测", "不确定", "疑似", "像是", "感觉像", "玩笑", "开玩笑", "调侃",
    "maybe", "perhaps", "possibly", "seems", "might be", "not sure", "uncertain", "unclear",
    "joking", "teasing", "banter",
];

/// Behavior labels in the agent's reasoning, scanned in this order.
pub const REASONING_BEHAVIOR_LABELS: &[(Behavior, &[&str])] = &[
    (
        Behavior::Insult,
        &["辱骂", "人身攻击", "恶意攻击", "insult", "personal attack", "verbal abuse", "abusive"],
    ),
    (
        Behavior::Harassment,
        &[
            "骚扰", "性暗示", "色情", "淫秽", "调戏", "非礼", "越界",
            "harass", "sexual", "obscene", "crossing the line", "crossed the line",
        ],
    ),
    (
        Behavior::Threat,
        &["威胁", "恐吓", "threat", "intimidat"],
    ),
    (
        Behavior::Rude,
        &[
            "不尊重", "下流", "不雅", "开黄腔", "荤段子",
            "disrespect", "vulgar", "crude", "dirty joke",
        ],
    ),
];

/// Positive tiers in the agent's reasoning, scanned from high to low.
pub const REASONING_POSITIVE_LABELS: &[(PositiveTier, &[&str])] = &[
    (
        PositiveTier::High,
        &["信任", "喜欢", "关心", "鼓励", "支持", "trust", "affection", "caring", "encourag", "support"],
    ),
    (
        PositiveTier::Mid,
        &[
            "感谢", "夸赞", "称赞", "认可", "肯定", "表扬",
            "gratitude", "thank", "praise", "compliment", "appreciat", "acknowledg",
        ],
    ),
    (PositiveTier::Low, &["友好", "friendly"]),
];

/// Goodwill in the latest user text, used to soften the tone directive.
pub const GOODWILL_KEYWORDS: &[&str] = &[
    "谢谢", "感谢", "辛苦了", "抱歉", "对不起", "麻烦你", "请", "拜托", "理解你", "慢慢来", "不急", "你真好",
    "thank", "sorry", "please", "appreciate", "take your time", "no rush", "no hurry",
    "you're kind", "i understand",
];

/// True when `term` occurs in `haystack`, at a word start for Latin terms.
pub fn occurs_in(haystack: &str, term: &str) -> bool {
    if !term.starts_with(|c: char| c.is_ascii_alphanumeric()) {
        return haystack.contains(term);
    }
    haystack.match_indices(term).any(|(start, _)| {
        !haystack[..start]
            .chars()
            .next_back()
            .is_some_and(|c| c.is_ascii_alphanumeric())
    })
}

/// First keyword of `list` that occurs in `haystack`.
pub fn first_match<'a>(haystack: &str, list: &[&'a str]) -> Option<&'a str> {
    list.iter().copied().find(|keyword| occurs_in(haystack, keyword))
}

pub fn contains_any(haystack: &str, list: &[&str]) -> bool {
    first_match(haystack, list).is_some()
}
