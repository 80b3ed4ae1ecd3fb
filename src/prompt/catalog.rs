//! Fixed generation catalog: the four expression categories, their prompts,
//! and the detection vocabulary used for labels.
use serde::{Deserialize, Serialize};
use std::fmt;

/// Detection classes in label-index order. Line `n` of `classes.txt` is
/// class index `n`.
pub const DETECTION_CLASSES: [&str; 5] = [
    "yawning_face",
    "hand",
    "phone",
    "focused_face",
    "anxious_face",
];

pub const PROMPTS_PER_CATEGORY: usize = 4;

/// Total number of (category, prompt) pairs in one run.
pub const TOTAL_PAIRS: usize = Category::ALL.len() * PROMPTS_PER_CATEGORY;

/// Index of `name` in [`DETECTION_CLASSES`].
pub fn class_index(name: &str) -> Option<usize> {
    DETECTION_CLASSES.iter().position(|c| *c == name)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    Yawning,
    HoldingPhone,
    Focused,
    Anxious,
}

impl Category {
    /// Declaration order; runs and archives follow it.
    pub const ALL: [Category; 4] = [
        Category::Yawning,
        Category::HoldingPhone,
        Category::Focused,
        Category::Anxious,
    ];

    pub fn wire_name(self) -> &'static str {
        match self {
            Category::Yawning => "YAWNING",
            Category::HoldingPhone => "HOLDING_PHONE",
            Category::Focused => "FOCUSED",
            Category::Anxious => "ANXIOUS",
        }
    }

    /// File-name stem used in the archive: lowercase, `_` becomes `-`.
    pub fn slug(self) -> String {
        self.wire_name().to_lowercase().replace('_', "-")
    }

    pub fn title(self) -> &'static str {
        match self {
            Category::Yawning => "打哈欠",
            Category::HoldingPhone => "玩手机",
            Category::Focused => "专注状态",
            Category::Anxious => "焦虑皱眉",
        }
    }

    /// Face class the labeler must use for this category, if any.
    pub fn face_class(self) -> Option<&'static str> {
        match self {
            Category::Yawning => Some("yawning_face"),
            Category::HoldingPhone => None,
            Category::Focused => Some("focused_face"),
            Category::Anxious => Some("anxious_face"),
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Category::Yawning => "yawning",
            Category::HoldingPhone => "holding a phone",
            Category::Focused => "focused",
            Category::Anxious => "anxious or frowning",
        }
    }

    pub fn prompts(self) -> &'static [&'static str; PROMPTS_PER_CATEGORY] {
        match self {
            Category::Yawning => &YAWNING_PROMPTS,
            Category::HoldingPhone => &HOLDING_PHONE_PROMPTS,
            Category::Focused => &FOCUSED_PROMPTS,
            Category::Anxious => &ANXIOUS_PROMPTS,
        }
    }

    pub fn parse(raw: &str) -> Option<Category> {
        let normalized = raw.trim().to_uppercase().replace('-', "_");
        Category::ALL.into_iter().find(|c| c.wire_name() == normalized)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

const YAWNING_PROMPTS: [&str; PROMPTS_PER_CATEGORY] = [
    "一张这个人的正面照片，ta正在打一个大大的哈欠，嘴巴张得很大，请确保看不到手。",
    "一张这个人的照片，ta正在打哈欠，头稍微向右傾斜，眼睛因为困倦而眯起来，请确保看不到手。",
    "一张这个人的照片，ta正打到一半，闭着眼睛，头向后仰，请确保看不到手。",
    "一张这个人的照片，ta正在打哈欠，双眼因困倦而含泪，请确保看不到手。",
];

const HOLDING_PHONE_PROMPTS: [&str; PROMPTS_PER_CATEGORY] = [
    "一张这个人的照片，ta正看着智能手机，面带微笑。",
    "一张这个人的照片，ta正拿着手机打字发信息。",
    "一张这个人的照片，ta正用智能手机自拍。",
    "一张这个人的照片，ta正滑动着手机屏幕，表情平淡。",
];

const FOCUSED_PROMPTS: [&str; PROMPTS_PER_CATEGORY] = [
    "一张这个人的特写肖像，表情专注而坚定，聚精会神地看着镜头外的东西，请确保看不到手。",
    "一张这个人的照片，ta正深度集中注意力，眼神明亮而锐利，表情平静，没有皱眉，请确保看不到手。",
    "一张这个人的照片，ta正全神贯注于一项任务，眼神里流露出思索的光芒，但表情是放松的，没有皱眉，请确保看不到手。",
    "一张这个人的照片，ta看起来敏锐而专注，目光锁定在目标上，准备好迎接挑战，请确保看不到手。",
];

const ANXIOUS_PROMPTS: [&str; PROMPTS_PER_CATEGORY] = [
    "一张这个人的照片，ta正皱着眉头，看起来忧虑而焦虑，请确保看不到手。",
    "一张这个人的照片，ta表情关切，眉毛因思考而皱起，请确保看不到手。",
    "一张这个人的照片，ta看起来压力很大，下巴紧绷，眼神充满忧虑，请确保看不到手。",
    "一张这个人的照片，ta正皱紧眉头，轻咬嘴唇，显得非常焦虑，请确保看不到手。",
];

/// One unit of work in a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromptPair {
    pub category: Category,
    /// 0-based position of the prompt within its category.
    pub index: usize,
    pub prompt: &'static str,
}

/// All pairs, grouped by category in declaration order, prompts in
/// declaration order within each category.
pub fn all_pairs() -> Vec<PromptPair> {
    Category::ALL
        .iter()
        .flat_map(|&category| {
            category
                .prompts()
                .iter()
                .enumerate()
                .map(move |(index, &prompt)| PromptPair { category, index, prompt })
        })
        .collect()
}
