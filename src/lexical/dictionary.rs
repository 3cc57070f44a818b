//! Keyword dictionaries for local lexical scoring
//!
//! Each dictionary lists, per label, substrings whose presence in normalized
//! text counts as evidence for that label. Entries are in label declaration
//! order, which is also the scan order during scoring.

use crate::types::{EmotionLabel, Language};

/// Keyword list for one label
pub type LabelKeywords = (EmotionLabel, &'static [&'static str]);

pub const KOREAN_KEYWORDS: &[LabelKeywords] = &[
    (EmotionLabel::Neutral, &["괜찮", "보통", "그냥", "일반", "평범"]),
    (
        EmotionLabel::Happy,
        &["행복", "기쁘", "좋아", "즐거", "신나", "웃", "사랑", "감사", "최고", "완벽"],
    ),
    (
        EmotionLabel::Excited,
        &["설레", "흥분", "기대", "두근", "신기", "놀라", "대박", "와우", "짜릿"],
    ),
    (
        EmotionLabel::Stressed,
        &["스트레스", "힘들", "지치", "짜증", "답답", "미치", "죽겠", "너무"],
    ),
    (
        EmotionLabel::Anxious,
        &["불안", "걱정", "초조", "긴장", "무서", "두려", "떨리", "조마조마"],
    ),
    (
        EmotionLabel::Sad,
        &["슬프", "우울", "눈물", "아프", "외로", "쓸쓸", "그리", "허전", "서글"],
    ),
    (
        EmotionLabel::Anger,
        &["화나", "짜증", "열받", "빡치", "미워", "싫어", "분노", "억울"],
    ),
    (EmotionLabel::Fear, &["무서", "두려", "공포", "겁나", "떨리", "불안"]),
    (
        EmotionLabel::Surprise,
        &["놀라", "깜짝", "헐", "대박", "믿기지", "어머", "세상에"],
    ),
    (
        EmotionLabel::Meditation,
        &["명상", "평화", "고요", "차분", "집중", "호흡", "마음"],
    ),
    (
        EmotionLabel::Fatigue,
        &["피곤", "졸리", "지치", "힘들", "녹초", "기진맥진", "쉬고싶"],
    ),
    (
        EmotionLabel::Depression,
        &["우울", "무기력", "의욕", "암담", "절망", "포기", "힘없"],
    ),
];

pub const ENGLISH_KEYWORDS: &[LabelKeywords] = &[
    (EmotionLabel::Neutral, &["okay", "fine", "normal", "regular", "average"]),
    (
        EmotionLabel::Happy,
        &["happy", "joy", "glad", "love", "great", "wonderful", "amazing", "thank"],
    ),
    (
        EmotionLabel::Excited,
        &["excited", "thrilled", "eager", "can't wait", "wow", "awesome"],
    ),
    (
        EmotionLabel::Stressed,
        &["stress", "pressure", "overwhelm", "too much", "can't handle"],
    ),
    (
        EmotionLabel::Anxious,
        &["anxious", "worry", "nervous", "scared", "afraid", "uncertain"],
    ),
    (
        EmotionLabel::Sad,
        &["sad", "cry", "tear", "miss", "lonely", "heartbreak", "depressed"],
    ),
    (
        EmotionLabel::Anger,
        &["angry", "mad", "furious", "hate", "annoyed", "frustrated"],
    ),
    (EmotionLabel::Fear, &["fear", "scared", "terrified", "panic", "horror"]),
    (
        EmotionLabel::Surprise,
        &["surprise", "shock", "unexpected", "omg", "wow", "unbelievable"],
    ),
    (
        EmotionLabel::Meditation,
        &["peace", "calm", "meditate", "mindful", "serene", "tranquil"],
    ),
    (
        EmotionLabel::Fatigue,
        &["tired", "exhausted", "sleepy", "drained", "worn out"],
    ),
    (
        EmotionLabel::Depression,
        &["depressed", "hopeless", "empty", "numb", "give up"],
    ),
];

/// Modifiers that multiply every label score by 1.3 each
pub const INTENSIFIERS: &[&str] = &[
    "매우", "너무", "정말", "진짜", "완전", "엄청", "very", "really", "so", "extremely",
];

/// Modifiers that multiply every label score by 0.7 each
pub const SOFTENERS: &[&str] = &["조금", "약간", "살짝", "a bit", "slightly", "somewhat"];

pub const INTENSIFIER_FACTOR: f64 = 1.3;
pub const SOFTENER_FACTOR: f64 = 0.7;

/// Dictionary for a detected language; anything but Korean scores against English
pub fn keywords_for(language: &Language) -> &'static [LabelKeywords] {
    match language {
        Language::Korean => KOREAN_KEYWORDS,
        _ => ENGLISH_KEYWORDS,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dictionaries_cover_every_label_in_order() {
        for dictionary in [KOREAN_KEYWORDS, ENGLISH_KEYWORDS] {
            let labels: Vec<EmotionLabel> = dictionary.iter().map(|(label, _)| *label).collect();
            assert_eq!(labels, EmotionLabel::ALL.to_vec());
        }
    }

    #[test]
    fn test_keywords_for_language() {
        assert_eq!(keywords_for(&Language::Korean).len(), 12);
        assert!(std::ptr::eq(keywords_for(&Language::English), ENGLISH_KEYWORDS));
        assert!(std::ptr::eq(
            keywords_for(&Language::Other("ja".to_string())),
            ENGLISH_KEYWORDS
        ));
    }
}
