//! Topic and audience cascades plus the batch classifier.
//!
//! Rule order is the priority order: a label matching both the speech and
//! the event patterns is a speech, because speech is listed first.

use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::extract::{self, ANNOUNCEMENT_MARKER};
use crate::{ClassifiedRecord, StoredRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TopicCategory {
    #[serde(rename = "演講/講座")]
    Speech,
    #[serde(rename = "徵才/招募")]
    Recruitment,
    #[serde(rename = "活動/競賽")]
    Event,
    #[serde(rename = "課程/教學")]
    Course,
    #[serde(rename = "系所/學院公告")]
    DepartmentNotice,
    #[serde(rename = "行政/校務公告")]
    AdministrativeNotice,
    #[serde(rename = "獎助學金/補助")]
    Scholarship,
    #[serde(rename = "其他")]
    Other,
}

impl TopicCategory {
    pub fn label(self) -> &'static str {
        match self {
            TopicCategory::Speech => "演講/講座",
            TopicCategory::Recruitment => "徵才/招募",
            TopicCategory::Event => "活動/競賽",
            TopicCategory::Course => "課程/教學",
            TopicCategory::DepartmentNotice => "系所/學院公告",
            TopicCategory::AdministrativeNotice => "行政/校務公告",
            TopicCategory::Scholarship => "獎助學金/補助",
            TopicCategory::Other => "其他",
        }
    }
}

impl fmt::Display for TopicCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AudienceCategory {
    #[serde(rename = "大一新生")]
    Freshman,
    #[serde(rename = "全校師生")]
    WholeCampus,
    #[serde(rename = "研究生")]
    Graduate,
    #[serde(rename = "特定系所/學院")]
    DepartmentSpecific,
    #[serde(rename = "國際學生/外籍生")]
    International,
    #[serde(rename = "全校或特定對象(未明)")]
    CampusOrSpecificUnspecified,
    #[serde(rename = "其他/未明")]
    Unspecified,
}

impl AudienceCategory {
    pub fn label(self) -> &'static str {
        match self {
            AudienceCategory::Freshman => "大一新生",
            AudienceCategory::WholeCampus => "全校師生",
            AudienceCategory::Graduate => "研究生",
            AudienceCategory::DepartmentSpecific => "特定系所/學院",
            AudienceCategory::International => "國際學生/外籍生",
            AudienceCategory::CampusOrSpecificUnspecified => "全校或特定對象(未明)",
            AudienceCategory::Unspecified => "其他/未明",
        }
    }
}

impl fmt::Display for AudienceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Ordered `(category, pattern)` rules with a default. The first rule whose
/// pattern matches decides the category.
pub struct Cascade<C> {
    rules: Vec<(C, Regex)>,
    default: C,
}

impl<C: Copy> Cascade<C> {
    pub fn new(rules: &[(C, &str)], case_insensitive: bool, default: C) -> Self {
        let rules = rules
            .iter()
            .map(|&(category, pattern)| {
                let re = RegexBuilder::new(pattern)
                    .case_insensitive(case_insensitive)
                    .build()
                    .expect("valid regex");
                (category, re)
            })
            .collect();
        Self { rules, default }
    }

    /// First matching category, if any rule matches.
    pub fn first_match(&self, text: &str) -> Option<C> {
        self.rules
            .iter()
            .find(|(_, re)| re.is_match(text))
            .map(|&(category, _)| category)
    }

    pub fn classify(&self, text: &str) -> C {
        self.first_match(text).unwrap_or(self.default)
    }

    pub fn rules(&self) -> impl Iterator<Item = C> + '_ {
        self.rules.iter().map(|&(category, _)| category)
    }

    pub fn default_category(&self) -> C {
        self.default
    }
}

pub static TOPICS: Lazy<Cascade<TopicCategory>> = Lazy::new(|| {
    Cascade::new(
        &[
            (
                TopicCategory::Speech,
                r"演講|講座|speech|talk|seminar|workshop|work shop",
            ),
            (TopicCategory::Recruitment, r"徵才|招募|recruit|招考|誠徵|聘任"),
            (
                TopicCategory::Event,
                r"活動|比賽|競賽|展覽|嘉年華|festival|camp",
            ),
            (
                TopicCategory::Course,
                r"課程|修課|選課|加退選|教學意見|EMI|教學資源",
            ),
            (
                TopicCategory::DepartmentNotice,
                r"學系公告|系公告|學系|學程|學院",
            ),
            (
                TopicCategory::AdministrativeNotice,
                r"停電|維護|防火牆|網路|校務|調整|管制|安全性|防疫|交通|班次|機房|資訊中心公告|總務處",
            ),
            (TopicCategory::Scholarship, r"獎學金|補助|經費|補貼|助學金"),
        ],
        true,
        TopicCategory::Other,
    )
});

pub static AUDIENCES: Lazy<Cascade<AudienceCategory>> = Lazy::new(|| {
    Cascade::new(
        &[
            (AudienceCategory::Freshman, r"大一|一年級|新生"),
            (
                AudienceCategory::WholeCampus,
                r"全校教職員生|全校教職員工生|全校師生|全校學生|全體教職員生|全體學生",
            ),
            (AudienceCategory::Graduate, r"碩士班|博士班|研究生|研究所"),
            (
                AudienceCategory::DepartmentSpecific,
                r"學系公告|系公告|學系|學程|學院|醫學系|護理系|資訊工程學系|資工系",
            ),
            (
                AudienceCategory::International,
                r"國際學生|外國學生|外籍生|International Students|EMI",
            ),
        ],
        false,
        AudienceCategory::Unspecified,
    )
});

pub fn classify_topic(text: &str) -> TopicCategory {
    TOPICS.classify(text)
}

/// Keyword cascade first; announcement-system mail with no keyword is
/// campus-or-specific before the final unspecified default.
pub fn classify_audience(text: &str) -> AudienceCategory {
    if let Some(audience) = AUDIENCES.first_match(text) {
        return audience;
    }
    if text.contains(ANNOUNCEMENT_MARKER) {
        return AudienceCategory::CampusOrSpecificUnspecified;
    }
    AUDIENCES.default_category()
}

/// Analysis text for a stored record: `raw`, then `content`, then
/// `subject`; the first non-empty one wins.
pub fn pick_text(record: &StoredRecord) -> &str {
    [&record.raw, &record.content, &record.subject]
        .into_iter()
        .find(|field| !field.is_empty())
        .map(String::as_str)
        .unwrap_or("")
}

pub fn classify_record(record: &StoredRecord) -> ClassifiedRecord {
    let text = pick_text(record);

    let sender = if !record.sender.is_empty() && record.sender != extract::UNKNOWN {
        record.sender.clone()
    } else {
        extract::parse_sender(text).unwrap_or_else(|| extract::UNKNOWN.to_string())
    };

    ClassifiedRecord {
        sender,
        date: extract::parse_date(text),
        hour: extract::parse_hour(text),
        topic: classify_topic(text),
        audience: classify_audience(text),
        unit: extract::extract_unit(text),
        raw: text.to_string(),
    }
}

pub fn classify<'a, I>(records: I) -> Vec<ClassifiedRecord>
where
    I: IntoIterator<Item = &'a StoredRecord>,
{
    records.into_iter().map(classify_record).collect()
}
