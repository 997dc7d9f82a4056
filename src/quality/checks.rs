//! Individual quality rules.
//!
//! Each check reads the course and the profile and returns its own
//! [`CheckOutcome`]; no check sees another's findings.

use super::{QualityIssue, Severity};
use crate::artifact::{Course, LessonContent, LessonKind};
use crate::config::ScoringProfile;
use std::collections::HashSet;

/// Check names, in evaluation order.
pub const CONTEXTUAL_RELEVANCE: &str = "contextual_relevance";
/// See [`content_balance`].
pub const CONTENT_BALANCE: &str = "content_balance";
/// See [`assessment_quality`].
pub const ASSESSMENT_QUALITY: &str = "assessment_quality";
/// See [`code_exercises`].
pub const CODE_EXERCISES: &str = "code_exercises";
/// See [`hands_on_exercises`].
pub const HANDS_ON_EXERCISES: &str = "hands_on_exercises";
/// See [`safety_warning`].
pub const SAFETY_WARNING: &str = "safety_warning";
/// See [`learning_objectives`].
pub const LEARNING_OBJECTIVES: &str = "learning_objectives";
/// See [`title_description`].
pub const TITLE_DESCRIPTION: &str = "title_description";

const MIN_QUESTIONS: usize = 5;
const OPTIONS_PER_QUESTION: usize = 4;
const MIN_EXPLANATION_CHARS: usize = 20;
const MIN_CODE_HINTS: usize = 2;
const MIN_STEPS: usize = 3;
const MIN_TIPS: usize = 2;
const MIN_OBJECTIVES: usize = 4;
const MIN_OBJECTIVE_CHARS: usize = 20;
const MIN_TITLE_CHARS: usize = 15;
const MIN_DESCRIPTION_CHARS: usize = 100;

/// Findings of one check.
#[derive(Debug, Default)]
pub struct CheckOutcome {
    /// `false` when the check's precondition does not hold (e.g. no hands-on
    /// lessons); such a check is neither passed nor failed.
    pub applicable: bool,
    /// Issues raised.
    pub issues: Vec<QualityIssue>,
    /// Structural warnings raised.
    pub warnings: Vec<String>,
}

impl CheckOutcome {
    fn new() -> Self {
        Self {
            applicable: true,
            ..Self::default()
        }
    }

    fn not_applicable() -> Self {
        Self::default()
    }

    /// A check passes only when it found nothing at all.
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty() && self.warnings.is_empty()
    }

    fn error(&mut self, check: &'static str, message: String, suggestion: Option<&str>) {
        self.issues.push(QualityIssue {
            severity: Severity::Error,
            check_name: check.to_string(),
            message,
            suggestion: suggestion.map(str::to_string),
        });
    }

    fn warning(&mut self, check: &'static str, message: String, suggestion: Option<&str>) {
        self.issues.push(QualityIssue {
            severity: Severity::Warning,
            check_name: check.to_string(),
            message,
            suggestion: suggestion.map(str::to_string),
        });
    }
}

/// Contextual keyword hits in a course.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContextHits {
    /// Distinct keywords found, across all sets.
    pub distinct: usize,
    /// `Σ hits × weight` over the sets.
    pub weighted: f64,
}

/// Count distinct contextual keywords present in `text` (already lowercase).
///
/// A keyword whose every occurrence lies inside a longer matched keyword
/// ("africa" inside "african") is not counted. A keyword listed in several
/// sets takes the weight of the first.
pub fn context_hits(text: &str, profile: &ScoringProfile) -> ContextHits {
    let mut seen = HashSet::new();
    let mut matched: Vec<(String, f64, Vec<(usize, usize)>)> = Vec::new();
    for set in &profile.context_keyword_sets {
        for keyword in &set.keywords {
            let keyword = keyword.to_lowercase();
            if keyword.is_empty() || !seen.insert(keyword.clone()) {
                continue;
            }
            let spans: Vec<(usize, usize)> = text
                .match_indices(keyword.as_str())
                .map(|(start, m)| (start, start + m.len()))
                .collect();
            if !spans.is_empty() {
                matched.push((keyword, set.weight, spans));
            }
        }
    }

    let covered = |keyword: &str, (start, end): (usize, usize)| {
        matched.iter().any(|(other, _, spans)| {
            other.len() > keyword.len()
                && spans.iter().any(|&(s, e)| s <= start && end <= e)
        })
    };

    let mut distinct = 0;
    let mut weighted = 0.0;
    for (keyword, weight, spans) in &matched {
        if spans.iter().any(|&span| !covered(keyword, span)) {
            distinct += 1;
            weighted += *weight;
        }
    }
    ContextHits { distinct, weighted }
}

fn contains_any(text: &str, needles: &[String]) -> bool {
    needles
        .iter()
        .any(|n| !n.is_empty() && text.contains(&n.to_lowercase()))
}

fn char_len(s: &str) -> usize {
    s.trim().chars().count()
}

/// Critical: the course must be anchored in the learner's context.
pub fn contextual_relevance(course: &Course, profile: &ScoringProfile) -> CheckOutcome {
    let mut out = CheckOutcome::new();
    let hits = context_hits(&course.text_corpus(), profile);

    if hits.distinct == 0 {
        out.error(
            CONTEXTUAL_RELEVANCE,
            "course contains no contextual references".into(),
            Some("ground examples in local places, currencies and ecosystem tools"),
        );
    } else if hits.distinct < profile.min_context_matches {
        out.warning(
            CONTEXTUAL_RELEVANCE,
            format!(
                "only {} contextual reference(s); expected at least {}",
                hits.distinct, profile.min_context_matches
            ),
            Some("add more locally relevant examples"),
        );
    }
    out
}

/// The course needs an assessment and must not be dominated by low-effort lessons.
pub fn content_balance(course: &Course, profile: &ScoringProfile) -> CheckOutcome {
    let mut out = CheckOutcome::new();

    if course.count_kind(LessonKind::Quiz) == 0 {
        out.error(
            CONTENT_BALANCE,
            "course has no assessment lesson".into(),
            Some("add at least one quiz"),
        );
        return out;
    }

    let low_effort = course.count_kind(profile.low_effort_kind);
    let ratio = low_effort as f64 / course.lessons.len() as f64;
    if ratio > profile.max_low_effort_ratio {
        out.warnings.push(format!(
            "{:.0}% of lessons are {:?}; mix in more interactive content",
            ratio * 100.0,
            profile.low_effort_kind
        ));
    }
    out
}

/// Every quiz must be long enough and every question well formed.
pub fn assessment_quality(course: &Course, _profile: &ScoringProfile) -> CheckOutcome {
    let quizzes: Vec<_> = course
        .lessons
        .iter()
        .filter_map(|l| match &l.content {
            LessonContent::Quiz { questions } => Some((l.title.as_str(), questions)),
            _ => None,
        })
        .collect();
    if quizzes.is_empty() {
        return CheckOutcome::not_applicable();
    }

    let mut out = CheckOutcome::new();
    for (title, questions) in quizzes {
        if questions.len() < MIN_QUESTIONS {
            out.error(
                ASSESSMENT_QUALITY,
                format!(
                    "quiz '{title}' has {} question(s); at least {MIN_QUESTIONS} required",
                    questions.len()
                ),
                None,
            );
        }

        for (i, q) in questions.iter().enumerate() {
            let n = i + 1;
            if q.options.len() != OPTIONS_PER_QUESTION {
                out.error(
                    ASSESSMENT_QUALITY,
                    format!(
                        "quiz '{title}' question {n} has {} options; exactly {OPTIONS_PER_QUESTION} required",
                        q.options.len()
                    ),
                    None,
                );
            }
            if q.correct_index >= q.options.len() {
                out.error(
                    ASSESSMENT_QUALITY,
                    format!(
                        "quiz '{title}' question {n} marks option {} correct but has {} options",
                        q.correct_index,
                        q.options.len()
                    ),
                    None,
                );
            }
            if char_len(&q.explanation) < MIN_EXPLANATION_CHARS {
                out.warning(
                    ASSESSMENT_QUALITY,
                    format!("quiz '{title}' question {n} has a thin explanation"),
                    Some("explain why the correct answer is correct"),
                );
            }
        }

        let distinct: HashSet<String> = questions
            .iter()
            .map(|q| q.prompt.trim().to_lowercase())
            .collect();
        if distinct.len() < questions.len() {
            out.warnings.push(format!(
                "quiz '{title}' may contain duplicate questions"
            ));
        }
    }
    out
}

/// Courses on the code track need runnable, guided, tested exercises.
pub fn code_exercises(course: &Course, profile: &ScoringProfile) -> CheckOutcome {
    if !course.track.eq_ignore_ascii_case(&profile.code_track) {
        return CheckOutcome::not_applicable();
    }

    let mut out = CheckOutcome::new();
    let mut found = false;
    for lesson in &course.lessons {
        let LessonContent::CodeExercise {
            starter_code,
            solution,
            tests,
            hints,
            ..
        } = &lesson.content
        else {
            continue;
        };
        found = true;
        let title = &lesson.title;

        let code = format!("{starter_code}\n{solution}\n{}", tests.join("\n")).to_lowercase();
        if !contains_any(&code, &profile.sdk_markers) {
            out.error(
                CODE_EXERCISES,
                format!("code exercise '{title}' does not use the expected SDK"),
                Some("import and use the platform SDK in starter code or solution"),
            );
        }
        if !contains_any(&starter_code.to_lowercase(), &profile.guidance_markers) {
            out.warning(
                CODE_EXERCISES,
                format!("starter code for '{title}' has no guidance markers"),
                Some("mark where the learner should write code"),
            );
        }
        if tests.is_empty() {
            out.error(
                CODE_EXERCISES,
                format!("code exercise '{title}' has no automated tests"),
                None,
            );
        }
        if hints.len() < MIN_CODE_HINTS {
            out.warning(
                CODE_EXERCISES,
                format!(
                    "code exercise '{title}' has {} hint(s); at least {MIN_CODE_HINTS} expected",
                    hints.len()
                ),
                None,
            );
        }
    }

    if !found {
        out.error(
            CODE_EXERCISES,
            format!("'{}' track course has no code exercise", profile.code_track),
            Some("add at least one code exercise"),
        );
    }
    out
}

/// Hands-on lessons need enough steps, tips and a real completion message.
pub fn hands_on_exercises(course: &Course, profile: &ScoringProfile) -> CheckOutcome {
    let exercises: Vec<_> = course
        .lessons
        .iter()
        .filter_map(|l| match &l.content {
            LessonContent::HandsOn {
                steps,
                tips,
                completion_message,
            } => Some((l.title.as_str(), steps, tips, completion_message)),
            _ => None,
        })
        .collect();
    if exercises.is_empty() {
        return CheckOutcome::not_applicable();
    }

    let mut out = CheckOutcome::new();
    for (title, steps, tips, completion_message) in exercises {
        if char_len(completion_message) < profile.min_completion_message_len {
            out.warning(
                HANDS_ON_EXERCISES,
                format!("hands-on '{title}' has a short completion message"),
                Some("tell the learner what they achieved"),
            );
        }
        if steps.len() < MIN_STEPS {
            out.error(
                HANDS_ON_EXERCISES,
                format!(
                    "hands-on '{title}' has {} step(s); at least {MIN_STEPS} required",
                    steps.len()
                ),
                None,
            );
        }
        if tips.len() < MIN_TIPS {
            out.warning(
                HANDS_ON_EXERCISES,
                format!(
                    "hands-on '{title}' has {} tip(s); at least {MIN_TIPS} expected",
                    tips.len()
                ),
                None,
            );
        }
    }
    out
}

/// Financially sensitive courses must warn about risk somewhere.
pub fn safety_warning(course: &Course, profile: &ScoringProfile) -> CheckOutcome {
    let headline = format!("{}\n{}", course.title, course.description).to_lowercase();
    if !contains_any(&headline, &profile.safety_trigger_keywords) {
        return CheckOutcome::not_applicable();
    }

    let mut out = CheckOutcome::new();
    if !contains_any(&course.text_corpus(), &profile.risk_warning_keywords) {
        out.error(
            SAFETY_WARNING,
            "course covers a risky topic without any risk warning".into(),
            Some("state the risks plainly, e.g. volatility and possible loss"),
        );
    }
    out
}

/// Enough objectives, each a real sentence.
pub fn learning_objectives(course: &Course, _profile: &ScoringProfile) -> CheckOutcome {
    let mut out = CheckOutcome::new();
    if course.objectives.len() < MIN_OBJECTIVES {
        out.error(
            LEARNING_OBJECTIVES,
            format!(
                "{} learning objective(s); at least {MIN_OBJECTIVES} required",
                course.objectives.len()
            ),
            None,
        );
    }
    for (i, objective) in course.objectives.iter().enumerate() {
        if char_len(objective) < MIN_OBJECTIVE_CHARS {
            out.warning(
                LEARNING_OBJECTIVES,
                format!("objective {} is too vague", i + 1),
                Some("state what the learner will be able to do"),
            );
        }
    }
    out
}

/// Title and description must be finished text of reasonable length.
pub fn title_description(course: &Course, profile: &ScoringProfile) -> CheckOutcome {
    let mut out = CheckOutcome::new();
    let title_len = char_len(&course.title);
    if title_len < MIN_TITLE_CHARS {
        out.error(
            TITLE_DESCRIPTION,
            format!("title has {title_len} characters; at least {MIN_TITLE_CHARS} required"),
            None,
        );
    }
    let description_len = char_len(&course.description);
    if description_len < MIN_DESCRIPTION_CHARS {
        out.error(
            TITLE_DESCRIPTION,
            format!(
                "description has {description_len} characters; at least {MIN_DESCRIPTION_CHARS} required"
            ),
            None,
        );
    }

    let headline = format!("{}\n{}", course.title, course.description).to_lowercase();
    let found: Vec<&str> = profile
        .placeholder_tokens
        .iter()
        .map(String::as_str)
        .filter(|t| !t.is_empty() && headline.contains(&t.to_lowercase()))
        .collect();
    if !found.is_empty() {
        out.error(
            TITLE_DESCRIPTION,
            format!("placeholder text found: {}", found.join(", ")),
            Some("replace placeholders with final copy"),
        );
    }
    out
}
