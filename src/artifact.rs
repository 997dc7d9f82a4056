//! Generated course artifact.
//!
//! ## Responsibility
//! Typed shape of the content returned by the generation service once it has
//! passed structural validation.
//!
//! ## NOT Responsible For
//! - Deciding whether raw data is structurally valid (that belongs to `validator`)
//! - Judging content quality (that belongs to `quality`)

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A generated course.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct Course {
    /// Course title.
    pub title: String,
    /// Course summary shown on the catalogue page.
    pub description: String,
    /// Learning track, e.g. `"developer"` or `"business"`.
    #[serde(default)]
    pub track: String,
    /// Learning objectives, one sentence each.
    #[serde(default)]
    pub objectives: Vec<String>,
    /// Ordered lessons.
    pub lessons: Vec<Lesson>,
    /// Catalogue metadata.
    #[serde(default)]
    pub metadata: CourseMetadata,
}

/// Catalogue metadata attached to a [`Course`].
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct CourseMetadata {
    /// Difficulty label, e.g. `"beginner"`.
    #[serde(default)]
    pub difficulty: String,
    /// Estimated time to complete.
    #[serde(default)]
    pub estimated_hours: f32,
    /// Free-form tags.
    #[serde(default)]
    pub tags: Vec<String>,
}

/// One lesson of a [`Course`].
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct Lesson {
    /// Lesson title.
    pub title: String,
    /// Type-specific body.
    #[serde(flatten)]
    pub content: LessonContent,
}

/// Lesson body, tagged by `type` on the wire.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LessonContent {
    /// Plain text to read.
    Reading {
        /// Lesson text.
        body: String,
    },
    /// Video with transcript.
    Video {
        /// Video location.
        url: String,
        /// Spoken content.
        #[serde(default)]
        transcript: String,
    },
    /// Multiple-choice assessment.
    Quiz {
        /// Questions in presentation order.
        questions: Vec<Question>,
    },
    /// Guided exercise performed outside the platform.
    HandsOn {
        /// Ordered steps.
        steps: Vec<String>,
        /// Practical tips.
        #[serde(default)]
        tips: Vec<String>,
        /// Message shown when the learner finishes.
        #[serde(default)]
        completion_message: String,
    },
    /// Programming exercise with automated tests.
    CodeExercise {
        /// Programming language of the exercise.
        language: String,
        /// Code handed to the learner.
        starter_code: String,
        /// Reference solution.
        #[serde(default)]
        solution: String,
        /// Automated test cases.
        #[serde(default)]
        tests: Vec<String>,
        /// Progressive hints.
        #[serde(default)]
        hints: Vec<String>,
    },
}

/// Discriminant of [`LessonContent`], usable in configuration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum LessonKind {
    /// [`LessonContent::Reading`]
    Reading,
    /// [`LessonContent::Video`]
    Video,
    /// [`LessonContent::Quiz`]
    Quiz,
    /// [`LessonContent::HandsOn`]
    HandsOn,
    /// [`LessonContent::CodeExercise`]
    CodeExercise,
}

/// A multiple-choice question.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct Question {
    /// Question text.
    pub prompt: String,
    /// Answer options.
    pub options: Vec<String>,
    /// Index into `options` of the correct answer.
    pub correct_index: usize,
    /// Why the correct answer is correct.
    #[serde(default)]
    pub explanation: String,
}

impl LessonContent {
    /// The discriminant of this body.
    pub fn kind(&self) -> LessonKind {
        match self {
            Self::Reading { .. } => LessonKind::Reading,
            Self::Video { .. } => LessonKind::Video,
            Self::Quiz { .. } => LessonKind::Quiz,
            Self::HandsOn { .. } => LessonKind::HandsOn,
            Self::CodeExercise { .. } => LessonKind::CodeExercise,
        }
    }
}

impl Lesson {
    /// Shorthand for `self.content.kind()`.
    pub fn kind(&self) -> LessonKind {
        self.content.kind()
    }

    fn push_text(&self, out: &mut Vec<String>) {
        out.push(self.title.clone());
        match &self.content {
            LessonContent::Reading { body } => out.push(body.clone()),
            LessonContent::Video { url, transcript } => {
                out.push(url.clone());
                out.push(transcript.clone());
            }
            LessonContent::Quiz { questions } => {
                for q in questions {
                    out.push(q.prompt.clone());
                    out.extend(q.options.iter().cloned());
                    out.push(q.explanation.clone());
                }
            }
            LessonContent::HandsOn {
                steps,
                tips,
                completion_message,
            } => {
                out.extend(steps.iter().cloned());
                out.extend(tips.iter().cloned());
                out.push(completion_message.clone());
            }
            LessonContent::CodeExercise {
                language,
                starter_code,
                solution,
                tests,
                hints,
            } => {
                out.push(language.clone());
                out.push(starter_code.clone());
                out.push(solution.clone());
                out.extend(tests.iter().cloned());
                out.extend(hints.iter().cloned());
            }
        }
    }
}

impl Course {
    /// Every human-readable string in the course, lowercased and joined by
    /// newlines. Field names never appear in the output.
    pub fn text_corpus(&self) -> String {
        let mut parts = vec![
            self.title.clone(),
            self.description.clone(),
            self.track.clone(),
        ];
        parts.extend(self.objectives.iter().cloned());
        for lesson in &self.lessons {
            lesson.push_text(&mut parts);
        }
        parts.push(self.metadata.difficulty.clone());
        parts.extend(self.metadata.tags.iter().cloned());
        parts.join("\n").to_lowercase()
    }

    /// Number of lessons of the given kind.
    pub fn count_kind(&self, kind: LessonKind) -> usize {
        self.lessons.iter().filter(|l| l.kind() == kind).count()
    }
}
