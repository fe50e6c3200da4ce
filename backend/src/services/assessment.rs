//! Assessment service: authoring, attempts, auto-grading and manual grading

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use rand::seq::SliceRandom;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::models::{
    attempts_remaining, awaits_manual_grading, check_can_start, grade_attempt, grade_objective,
    is_time_expired, validate_manual_points, validate_question, AssessmentStatus, AttemptStatus,
    NotificationChannel, NotificationType, QuestionType, DEFAULT_MAX_ATTEMPTS,
    DEFAULT_PASSING_SCORE,
};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::services::gamification::GamificationService;
use crate::services::notification::{NotificationService, SendNotification};

/// Assessment service
#[derive(Clone)]
pub struct AssessmentService {
    db: PgPool,
}

/// Assessment record
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Assessment {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub course_id: Option<Uuid>,
    pub lesson_id: Option<Uuid>,
    pub passing_score: i32,
    pub time_limit_minutes: Option<i32>,
    pub max_attempts: i32,
    pub shuffle_questions: bool,
    pub shuffle_answers: bool,
    pub show_correct_answers: bool,
    pub status: AssessmentStatus,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Question record
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Question {
    pub id: Uuid,
    pub assessment_id: Uuid,
    pub question_type: QuestionType,
    pub text: String,
    pub explanation: String,
    pub points: Decimal,
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
}

/// Answer option (author view)
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Answer {
    pub id: Uuid,
    pub question_id: Uuid,
    pub text: String,
    pub is_correct: bool,
    pub sort_order: i32,
}

/// Question with its options
#[derive(Debug, Clone, Serialize)]
pub struct QuestionWithAnswers {
    #[serde(flatten)]
    pub question: Question,
    pub answers: Vec<Answer>,
}

/// Assessment with questions (author view)
#[derive(Debug, Serialize)]
pub struct AssessmentDetail {
    #[serde(flatten)]
    pub assessment: Assessment,
    pub questions: Vec<QuestionWithAnswers>,
    pub total_points: Decimal,
}

/// Attempt record
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Attempt {
    pub id: Uuid,
    pub assessment_id: Uuid,
    pub user_id: Uuid,
    pub attempt_number: i32,
    pub status: AttemptStatus,
    pub score: Option<Decimal>,
    pub passed: Option<bool>,
    pub question_order: Vec<Uuid>,
    pub started_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub graded_at: Option<DateTime<Utc>>,
    pub graded_by: Option<Uuid>,
}

/// Recorded answer in an attempt
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct AttemptAnswer {
    pub id: Uuid,
    pub attempt_id: Uuid,
    pub question_id: Uuid,
    pub selected_answers: Vec<Uuid>,
    pub text_answer: Option<String>,
    pub is_correct: Option<bool>,
    pub points_awarded: Option<Decimal>,
    pub feedback: Option<String>,
    pub answered_at: DateTime<Utc>,
}

/// Answer option as shown to a learner
#[derive(Debug, Clone, Serialize)]
pub struct LearnerAnswer {
    pub id: Uuid,
    pub text: String,
}

/// Question as shown to a learner
#[derive(Debug, Clone, Serialize)]
pub struct LearnerQuestion {
    pub id: Uuid,
    pub question_type: QuestionType,
    pub text: String,
    pub points: Decimal,
    pub answers: Vec<LearnerAnswer>,
}

/// An open attempt with its questions
#[derive(Debug, Serialize)]
pub struct AttemptSession {
    pub attempt: Attempt,
    pub assessment_title: String,
    pub time_limit_minutes: Option<i32>,
    pub expires_at: Option<DateTime<Utc>>,
    pub questions: Vec<LearnerQuestion>,
}

/// Per-question result
#[derive(Debug, Serialize)]
pub struct QuestionResult {
    pub question_id: Uuid,
    pub question_type: QuestionType,
    pub text: String,
    pub points: Decimal,
    pub selected_answers: Vec<Uuid>,
    pub text_answer: Option<String>,
    pub is_correct: Option<bool>,
    pub points_awarded: Option<Decimal>,
    pub feedback: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correct_answers: Option<Vec<Uuid>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

/// Attempt outcome
#[derive(Debug, Serialize)]
pub struct AttemptResult {
    pub attempt: Attempt,
    pub passing_score: i32,
    pub questions: Vec<QuestionResult>,
}

/// Attempts of a user with the remaining allowance
#[derive(Debug, Serialize)]
pub struct AttemptHistory {
    pub attempts: Vec<Attempt>,
    pub max_attempts: i32,
    /// `None` when unlimited
    pub attempts_remaining: Option<i64>,
    pub best_score: Option<Decimal>,
    pub passed: bool,
}

/// Per-question statistics
#[derive(Debug, Serialize, FromRow)]
pub struct QuestionStatistics {
    pub question_id: Uuid,
    pub text: String,
    pub answered: i64,
    pub correct: i64,
    pub correct_rate: Decimal,
}

/// Assessment statistics
#[derive(Debug, Serialize)]
pub struct AssessmentStatistics {
    pub assessment_id: Uuid,
    pub total_attempts: i64,
    pub graded_attempts: i64,
    pub unique_users: i64,
    pub average_score: Decimal,
    pub pass_rate: Decimal,
    pub questions: Vec<QuestionStatistics>,
}

/// Answer awaiting manual grading
#[derive(Debug, Serialize, FromRow)]
pub struct PendingAnswer {
    pub answer_id: Uuid,
    pub attempt_id: Uuid,
    pub assessment_id: Uuid,
    pub assessment_title: String,
    pub user_id: Uuid,
    pub user_name: String,
    pub question_id: Uuid,
    pub question_type: QuestionType,
    pub question_text: String,
    pub max_points: Decimal,
    pub text_answer: Option<String>,
    pub answered_at: DateTime<Utc>,
}

/// Input for creating an assessment
#[derive(Debug, Deserialize, Validate)]
pub struct CreateAssessmentInput {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    pub description: Option<String>,
    pub course_id: Option<Uuid>,
    pub lesson_id: Option<Uuid>,
    #[validate(range(min = 0, max = 100))]
    pub passing_score: Option<i32>,
    #[validate(range(min = 1))]
    pub time_limit_minutes: Option<i32>,
    #[validate(range(min = 0))]
    pub max_attempts: Option<i32>,
    pub shuffle_questions: Option<bool>,
    pub shuffle_answers: Option<bool>,
    pub show_correct_answers: Option<bool>,
}

/// Input for updating an assessment
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateAssessmentInput {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    pub description: Option<String>,
    #[validate(range(min = 0, max = 100))]
    pub passing_score: Option<i32>,
    #[validate(range(min = 1))]
    pub time_limit_minutes: Option<i32>,
    #[validate(range(min = 0))]
    pub max_attempts: Option<i32>,
    pub shuffle_questions: Option<bool>,
    pub shuffle_answers: Option<bool>,
    pub show_correct_answers: Option<bool>,
}

/// Answer option input
#[derive(Debug, Deserialize, Validate)]
pub struct AnswerInput {
    #[validate(length(min = 1, max = 1000))]
    pub text: String,
    #[serde(default)]
    pub is_correct: bool,
}

/// Input for creating or replacing a question
#[derive(Debug, Deserialize, Validate)]
pub struct QuestionInput {
    pub question_type: QuestionType,
    #[validate(length(min = 1))]
    pub text: String,
    pub explanation: Option<String>,
    pub points: Option<Decimal>,
    pub sort_order: Option<i32>,
    #[serde(default)]
    #[validate]
    pub answers: Vec<AnswerInput>,
}

/// Learner answer submission
#[derive(Debug, Deserialize)]
pub struct SubmitAnswerInput {
    pub question_id: Uuid,
    #[serde(default)]
    pub selected_answers: Vec<Uuid>,
    pub text_answer: Option<String>,
}

/// Instructor grading input
#[derive(Debug, Deserialize)]
pub struct GradeAnswerInput {
    pub points_awarded: Decimal,
    pub feedback: Option<String>,
}

const ASSESSMENT_COLUMNS: &str = r#"
    id, title, description, course_id, lesson_id, passing_score, time_limit_minutes,
    max_attempts, shuffle_questions, shuffle_answers, show_correct_answers, status,
    created_by, created_at, updated_at
"#;

const ATTEMPT_COLUMNS: &str = r#"
    id, assessment_id, user_id, attempt_number, status, score, passed, question_order,
    started_at, submitted_at, graded_at, graded_by
"#;

const ANSWER_COLUMNS: &str = r#"
    id, attempt_id, question_id, selected_answers, text_answer, is_correct,
    points_awarded, feedback, answered_at
"#;

/// Shuffle in place with a thread-local generator
fn shuffle<T>(items: &mut [T]) {
    let mut rng = rand::rng();
    items.shuffle(&mut rng);
}

/// Correct option ids: the authored sequence for ordering questions, else the flagged set
fn correct_answer_ids(question_type: QuestionType, answers: &[Answer]) -> Vec<Uuid> {
    let mut sorted: Vec<&Answer> = answers.iter().collect();
    sorted.sort_by_key(|a| a.sort_order);
    sorted
        .into_iter()
        .filter(|a| question_type == QuestionType::Ordering || a.is_correct)
        .map(|a| a.id)
        .collect()
}

impl AssessmentService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    // ========================================================================
    // Authoring
    // ========================================================================

    /// Get an assessment record
    pub async fn get_assessment(&self, assessment_id: Uuid) -> AppResult<Assessment> {
        sqlx::query_as::<_, Assessment>(&format!(
            "SELECT {} FROM assessments WHERE id = $1",
            ASSESSMENT_COLUMNS
        ))
        .bind(assessment_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Assessment".to_string()))
    }

    /// Assessments, optionally limited to a course
    pub async fn list_assessments(
        &self,
        course_id: Option<Uuid>,
        status: Option<AssessmentStatus>,
    ) -> AppResult<Vec<Assessment>> {
        let assessments = sqlx::query_as::<_, Assessment>(&format!(
            r#"
            SELECT {}
            FROM assessments
            WHERE ($1::uuid IS NULL OR course_id = $1)
              AND ($2::assessment_status IS NULL OR status = $2)
            ORDER BY created_at DESC
            "#,
            ASSESSMENT_COLUMNS
        ))
        .bind(course_id)
        .bind(status)
        .fetch_all(&self.db)
        .await?;
        Ok(assessments)
    }

    /// Assessment with questions and correct answers
    pub async fn get_detail(&self, assessment_id: Uuid) -> AppResult<AssessmentDetail> {
        let assessment = self.get_assessment(assessment_id).await?;
        let questions = self.questions_with_answers(assessment_id).await?;
        let total_points = questions.iter().map(|q| q.question.points).sum();
        Ok(AssessmentDetail {
            assessment,
            questions,
            total_points,
        })
    }

    async fn questions_with_answers(&self, assessment_id: Uuid) -> AppResult<Vec<QuestionWithAnswers>> {
        let questions = sqlx::query_as::<_, Question>(
            r#"
            SELECT id, assessment_id, question_type, text, explanation, points, sort_order, created_at
            FROM questions
            WHERE assessment_id = $1
            ORDER BY sort_order, created_at
            "#,
        )
        .bind(assessment_id)
        .fetch_all(&self.db)
        .await?;

        let answers = sqlx::query_as::<_, Answer>(
            r#"
            SELECT a.id, a.question_id, a.text, a.is_correct, a.sort_order
            FROM answers a
            JOIN questions q ON q.id = a.question_id
            WHERE q.assessment_id = $1
            ORDER BY a.sort_order
            "#,
        )
        .bind(assessment_id)
        .fetch_all(&self.db)
        .await?;

        let mut by_question: HashMap<Uuid, Vec<Answer>> = HashMap::new();
        for answer in answers {
            by_question.entry(answer.question_id).or_default().push(answer);
        }

        Ok(questions
            .into_iter()
            .map(|question| {
                let answers = by_question.remove(&question.id).unwrap_or_default();
                QuestionWithAnswers { question, answers }
            })
            .collect())
    }

    /// Create a draft assessment
    pub async fn create_assessment(
        &self,
        created_by: Uuid,
        input: CreateAssessmentInput,
    ) -> AppResult<Assessment> {
        input.validate()?;

        let assessment = sqlx::query_as::<_, Assessment>(&format!(
            r#"
            INSERT INTO assessments (
                title, description, course_id, lesson_id, passing_score, time_limit_minutes,
                max_attempts, shuffle_questions, shuffle_answers, show_correct_answers, created_by
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING {}
            "#,
            ASSESSMENT_COLUMNS
        ))
        .bind(input.title.trim())
        .bind(input.description.unwrap_or_default())
        .bind(input.course_id)
        .bind(input.lesson_id)
        .bind(input.passing_score.unwrap_or(DEFAULT_PASSING_SCORE))
        .bind(input.time_limit_minutes)
        .bind(input.max_attempts.unwrap_or(DEFAULT_MAX_ATTEMPTS))
        .bind(input.shuffle_questions.unwrap_or(false))
        .bind(input.shuffle_answers.unwrap_or(false))
        .bind(input.show_correct_answers.unwrap_or(true))
        .bind(created_by)
        .fetch_one(&self.db)
        .await?;
        Ok(assessment)
    }

    /// Update assessment settings
    pub async fn update_assessment(
        &self,
        assessment_id: Uuid,
        input: UpdateAssessmentInput,
    ) -> AppResult<Assessment> {
        input.validate()?;
        sqlx::query_as::<_, Assessment>(&format!(
            r#"
            UPDATE assessments SET
                title = COALESCE($2, title),
                description = COALESCE($3, description),
                passing_score = COALESCE($4, passing_score),
                time_limit_minutes = COALESCE($5, time_limit_minutes),
                max_attempts = COALESCE($6, max_attempts),
                shuffle_questions = COALESCE($7, shuffle_questions),
                shuffle_answers = COALESCE($8, shuffle_answers),
                show_correct_answers = COALESCE($9, show_correct_answers),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            ASSESSMENT_COLUMNS
        ))
        .bind(assessment_id)
        .bind(&input.title)
        .bind(&input.description)
        .bind(input.passing_score)
        .bind(input.time_limit_minutes)
        .bind(input.max_attempts)
        .bind(input.shuffle_questions)
        .bind(input.shuffle_answers)
        .bind(input.show_correct_answers)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Assessment".to_string()))
    }

    /// Change the lifecycle status; publishing requires at least one question
    pub async fn set_status(
        &self,
        assessment_id: Uuid,
        status: AssessmentStatus,
    ) -> AppResult<Assessment> {
        let assessment = self.get_assessment(assessment_id).await?;
        if assessment.status == status {
            return Err(AppError::InvalidStateTransition(
                "Assessment already has this status".to_string(),
            ));
        }
        if status == AssessmentStatus::Published {
            let questions = self.question_count(assessment_id).await?;
            if questions == 0 {
                return Err(AppError::rule("Assessment has no questions"));
            }
        }

        let assessment = sqlx::query_as::<_, Assessment>(&format!(
            "UPDATE assessments SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING {}",
            ASSESSMENT_COLUMNS
        ))
        .bind(assessment_id)
        .bind(status)
        .fetch_one(&self.db)
        .await?;
        Ok(assessment)
    }

    /// Delete an assessment that has no attempts
    pub async fn delete_assessment(&self, assessment_id: Uuid) -> AppResult<()> {
        let attempts = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM assessment_attempts WHERE assessment_id = $1",
        )
        .bind(assessment_id)
        .fetch_one(&self.db)
        .await?;
        if attempts > 0 {
            return Err(AppError::rule("Assessment has attempts and cannot be deleted"));
        }
        let result = sqlx::query("DELETE FROM assessments WHERE id = $1")
            .bind(assessment_id)
            .execute(&self.db)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Assessment".to_string()));
        }
        Ok(())
    }

    async fn question_count(&self, assessment_id: Uuid) -> AppResult<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM questions WHERE assessment_id = $1",
        )
        .bind(assessment_id)
        .fetch_one(&self.db)
        .await?;
        Ok(count)
    }

    async fn ensure_draft(&self, assessment_id: Uuid) -> AppResult<()> {
        let assessment = self.get_assessment(assessment_id).await?;
        if assessment.status != AssessmentStatus::Draft {
            return Err(AppError::rule("Only draft assessments can be edited"));
        }
        Ok(())
    }

    /// Add a question with its options
    pub async fn add_question(
        &self,
        assessment_id: Uuid,
        input: QuestionInput,
    ) -> AppResult<QuestionWithAnswers> {
        input.validate()?;
        self.ensure_draft(assessment_id).await?;
        check_question_input(&input)?;

        let mut tx = self.db.begin().await?;

        let question = sqlx::query_as::<_, Question>(
            r#"
            INSERT INTO questions (assessment_id, question_type, text, explanation, points, sort_order)
            VALUES (
                $1, $2, $3, $4, $5,
                COALESCE($6, (SELECT COALESCE(MAX(sort_order), 0) + 1 FROM questions WHERE assessment_id = $1))
            )
            RETURNING id, assessment_id, question_type, text, explanation, points, sort_order, created_at
            "#,
        )
        .bind(assessment_id)
        .bind(input.question_type)
        .bind(input.text.trim())
        .bind(input.explanation.clone().unwrap_or_default())
        .bind(input.points.unwrap_or(Decimal::ONE))
        .bind(input.sort_order)
        .fetch_one(&mut *tx)
        .await?;

        let answers = insert_answers(&mut tx, question.id, &input.answers).await?;

        tx.commit().await?;
        Ok(QuestionWithAnswers { question, answers })
    }

    /// Replace a question and its options
    pub async fn update_question(
        &self,
        assessment_id: Uuid,
        question_id: Uuid,
        input: QuestionInput,
    ) -> AppResult<QuestionWithAnswers> {
        input.validate()?;
        self.ensure_draft(assessment_id).await?;
        check_question_input(&input)?;

        let mut tx = self.db.begin().await?;

        let question = sqlx::query_as::<_, Question>(
            r#"
            UPDATE questions SET
                question_type = $3,
                text = $4,
                explanation = COALESCE($5, explanation),
                points = COALESCE($6, points),
                sort_order = COALESCE($7, sort_order)
            WHERE id = $2 AND assessment_id = $1
            RETURNING id, assessment_id, question_type, text, explanation, points, sort_order, created_at
            "#,
        )
        .bind(assessment_id)
        .bind(question_id)
        .bind(input.question_type)
        .bind(input.text.trim())
        .bind(&input.explanation)
        .bind(input.points)
        .bind(input.sort_order)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Question".to_string()))?;

        sqlx::query("DELETE FROM answers WHERE question_id = $1")
            .bind(question_id)
            .execute(&mut *tx)
            .await?;
        let answers = insert_answers(&mut tx, question.id, &input.answers).await?;

        tx.commit().await?;
        Ok(QuestionWithAnswers { question, answers })
    }

    /// Delete a question
    pub async fn delete_question(&self, assessment_id: Uuid, question_id: Uuid) -> AppResult<()> {
        self.ensure_draft(assessment_id).await?;
        let result = sqlx::query("DELETE FROM questions WHERE id = $2 AND assessment_id = $1")
            .bind(assessment_id)
            .bind(question_id)
            .execute(&self.db)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Question".to_string()));
        }
        Ok(())
    }

    // ========================================================================
    // Attempts
    // ========================================================================

    async fn get_attempt(&self, attempt_id: Uuid) -> AppResult<Attempt> {
        sqlx::query_as::<_, Attempt>(&format!(
            "SELECT {} FROM assessment_attempts WHERE id = $1",
            ATTEMPT_COLUMNS
        ))
        .bind(attempt_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Attempt".to_string()))
    }

    /// Attempt owned by the user
    async fn owned_attempt(&self, attempt_id: Uuid, user_id: Uuid) -> AppResult<Attempt> {
        let attempt = self.get_attempt(attempt_id).await?;
        if attempt.user_id != user_id {
            return Err(AppError::NotFound("Attempt".to_string()));
        }
        Ok(attempt)
    }

    async fn expire_attempt(&self, attempt_id: Uuid) -> AppResult<()> {
        sqlx::query(
            "UPDATE assessment_attempts SET status = 'expired', submitted_at = NOW() WHERE id = $1",
        )
        .bind(attempt_id)
        .execute(&self.db)
        .await?;
        tracing::debug!(attempt_id = %attempt_id, "Attempt expired");
        Ok(())
    }

    /// Open a new attempt
    pub async fn start_attempt(&self, assessment_id: Uuid, user_id: Uuid) -> AppResult<AttemptSession> {
        let assessment = self.get_assessment(assessment_id).await?;
        let question_count = self.question_count(assessment_id).await?;

        // An abandoned timed attempt should not block a new one
        let open = sqlx::query_as::<_, Attempt>(&format!(
            r#"
            SELECT {} FROM assessment_attempts
            WHERE assessment_id = $1 AND user_id = $2 AND status = 'in_progress'
            "#,
            ATTEMPT_COLUMNS
        ))
        .bind(assessment_id)
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?;
        let mut has_open = open.is_some();
        if let Some(open) = open {
            if is_time_expired(open.started_at, assessment.time_limit_minutes, Utc::now()) {
                self.expire_attempt(open.id).await?;
                has_open = false;
            }
        }

        let used = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM assessment_attempts WHERE assessment_id = $1 AND user_id = $2",
        )
        .bind(assessment_id)
        .bind(user_id)
        .fetch_one(&self.db)
        .await?;

        check_can_start(
            assessment.status,
            question_count,
            has_open,
            assessment.max_attempts,
            used,
        )
        .map_err(AppError::rule)?;

        let questions = self.questions_with_answers(assessment_id).await?;
        let mut order: Vec<Uuid> = questions.iter().map(|q| q.question.id).collect();
        if assessment.shuffle_questions {
            shuffle(&mut order);
        }

        let attempt = sqlx::query_as::<_, Attempt>(&format!(
            r#"
            INSERT INTO assessment_attempts (assessment_id, user_id, attempt_number, question_order)
            VALUES ($1, $2, $3, $4)
            RETURNING {}
            "#,
            ATTEMPT_COLUMNS
        ))
        .bind(assessment_id)
        .bind(user_id)
        .bind(used as i32 + 1)
        .bind(&order)
        .fetch_one(&self.db)
        .await?;

        tracing::info!(attempt_id = %attempt.id, assessment_id = %assessment_id, user_id = %user_id, "Attempt started");

        Ok(build_session(&assessment, attempt, questions))
    }

    /// Resume an open attempt
    pub async fn get_session(&self, attempt_id: Uuid, user_id: Uuid) -> AppResult<AttemptSession> {
        let attempt = self.owned_attempt(attempt_id, user_id).await?;
        if attempt.status != AttemptStatus::InProgress {
            return Err(AppError::rule("Attempt is not in progress"));
        }
        let assessment = self.get_assessment(attempt.assessment_id).await?;
        let questions = self.questions_with_answers(attempt.assessment_id).await?;
        Ok(build_session(&assessment, attempt, questions))
    }

    /// Record an answer; objective questions are graded immediately
    pub async fn submit_answer(
        &self,
        attempt_id: Uuid,
        user_id: Uuid,
        input: SubmitAnswerInput,
    ) -> AppResult<AttemptAnswer> {
        let attempt = self.owned_attempt(attempt_id, user_id).await?;
        if attempt.status != AttemptStatus::InProgress {
            return Err(AppError::rule("Attempt is not in progress"));
        }

        let assessment = self.get_assessment(attempt.assessment_id).await?;
        if is_time_expired(attempt.started_at, assessment.time_limit_minutes, Utc::now()) {
            self.expire_attempt(attempt_id).await?;
            return Err(AppError::rule("Time limit exceeded"));
        }

        if !attempt.question_order.contains(&input.question_id) {
            return Err(AppError::NotFound("Question".to_string()));
        }

        let question = sqlx::query_as::<_, Question>(
            r#"
            SELECT id, assessment_id, question_type, text, explanation, points, sort_order, created_at
            FROM questions WHERE id = $1
            "#,
        )
        .bind(input.question_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Question".to_string()))?;

        let (is_correct, points_awarded, text_answer) =
            if question.question_type.requires_manual_grading() {
                let text = input
                    .text_answer
                    .as_deref()
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .ok_or_else(|| {
                        AppError::validation(
                            "text_answer",
                            "An answer is required",
                            "Debe escribir una respuesta",
                        )
                    })?;
                (None, None, Some(text.to_string()))
            } else {
                let answers = sqlx::query_as::<_, Answer>(
                    "SELECT id, question_id, text, is_correct, sort_order FROM answers WHERE question_id = $1",
                )
                .bind(question.id)
                .fetch_all(&self.db)
                .await?;

                if input
                    .selected_answers
                    .iter()
                    .any(|id| !answers.iter().any(|a| a.id == *id))
                {
                    return Err(AppError::validation(
                        "selected_answers",
                        "Selected option does not belong to the question",
                        "La opción seleccionada no pertenece a la pregunta",
                    ));
                }

                let correct = correct_answer_ids(question.question_type, &answers);
                let is_correct =
                    grade_objective(question.question_type, &input.selected_answers, &correct);
                let points = if is_correct {
                    question.points
                } else {
                    Decimal::ZERO
                };
                (Some(is_correct), Some(points), None)
            };

        let answer = sqlx::query_as::<_, AttemptAnswer>(&format!(
            r#"
            INSERT INTO attempt_answers (
                attempt_id, question_id, selected_answers, text_answer, is_correct, points_awarded
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (attempt_id, question_id) DO UPDATE SET
                selected_answers = EXCLUDED.selected_answers,
                text_answer = EXCLUDED.text_answer,
                is_correct = EXCLUDED.is_correct,
                points_awarded = EXCLUDED.points_awarded,
                answered_at = NOW()
            RETURNING {}
            "#,
            ANSWER_COLUMNS
        ))
        .bind(attempt_id)
        .bind(question.id)
        .bind(&input.selected_answers)
        .bind(&text_answer)
        .bind(is_correct)
        .bind(points_awarded)
        .fetch_one(&self.db)
        .await?;

        Ok(answer)
    }

    /// Close an attempt; graded immediately unless free-text answers need review
    pub async fn submit_attempt(&self, attempt_id: Uuid, user_id: Uuid) -> AppResult<Attempt> {
        let attempt = self.owned_attempt(attempt_id, user_id).await?;
        if attempt.status != AttemptStatus::InProgress {
            return Err(AppError::rule("Attempt is not in progress"));
        }

        let assessment = self.get_assessment(attempt.assessment_id).await?;
        if is_time_expired(attempt.started_at, assessment.time_limit_minutes, Utc::now()) {
            self.expire_attempt(attempt_id).await?;
            return Err(AppError::rule("Time limit exceeded"));
        }

        let submitted = sqlx::query_as::<_, Attempt>(&format!(
            r#"
            UPDATE assessment_attempts SET status = 'submitted', submitted_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            ATTEMPT_COLUMNS
        ))
        .bind(attempt_id)
        .fetch_one(&self.db)
        .await?;

        let ungraded = sqlx::query_scalar::<_, QuestionType>(
            r#"
            SELECT q.question_type
            FROM attempt_answers aa
            JOIN questions q ON q.id = aa.question_id
            WHERE aa.attempt_id = $1 AND aa.points_awarded IS NULL
            "#,
        )
        .bind(attempt_id)
        .fetch_all(&self.db)
        .await?;

        if !awaits_manual_grading(&ungraded) {
            return self.finalize(attempt_id, None).await;
        }
        Ok(submitted)
    }

    /// Grade a submitted attempt from its recorded points
    pub async fn finalize(&self, attempt_id: Uuid, graded_by: Option<Uuid>) -> AppResult<Attempt> {
        let attempt = self.get_attempt(attempt_id).await?;
        if attempt.status != AttemptStatus::Submitted {
            return Err(AppError::rule("Only submitted attempts can be graded"));
        }
        let assessment = self.get_assessment(attempt.assessment_id).await?;

        let (earned, total) = sqlx::query_as::<_, (Option<Decimal>, Option<Decimal>)>(
            r#"
            SELECT
                (SELECT SUM(points_awarded) FROM attempt_answers WHERE attempt_id = $1),
                (SELECT SUM(points) FROM questions WHERE id = ANY($2))
            "#,
        )
        .bind(attempt_id)
        .bind(&attempt.question_order)
        .fetch_one(&self.db)
        .await?;

        let outcome = grade_attempt(
            earned.unwrap_or(Decimal::ZERO),
            total.unwrap_or(Decimal::ZERO),
            assessment.passing_score,
        );

        let graded = sqlx::query_as::<_, Attempt>(&format!(
            r#"
            UPDATE assessment_attempts SET
                status = 'graded', score = $2, passed = $3, graded_at = NOW(), graded_by = $4
            WHERE id = $1
            RETURNING {}
            "#,
            ATTEMPT_COLUMNS
        ))
        .bind(attempt_id)
        .bind(outcome.score)
        .bind(outcome.passed)
        .bind(graded_by)
        .fetch_one(&self.db)
        .await?;

        tracing::info!(
            attempt_id = %attempt_id,
            score = %outcome.score,
            passed = outcome.passed,
            "Attempt graded"
        );

        GamificationService::new(self.db.clone())
            .on_assessment_graded(graded.user_id, attempt_id, outcome.score)
            .await?;

        NotificationService::new(self.db.clone())
            .send(
                SendNotification::new(
                    graded.user_id,
                    NotificationType::AssessmentGraded,
                    NotificationChannel::InApp,
                )
                .with("score", outcome.score)
                .with("assessment_title", &assessment.title)
                .action_url(format!("/attempts/{}/results", attempt_id)),
            )
            .await?;

        Ok(graded)
    }

    /// Grade a free-text answer; the attempt is graded once nothing is pending
    pub async fn grade_answer(
        &self,
        answer_id: Uuid,
        graded_by: Uuid,
        input: GradeAnswerInput,
    ) -> AppResult<AttemptAnswer> {
        let (attempt_id, attempt_status, max_points) =
            sqlx::query_as::<_, (Uuid, AttemptStatus, Decimal)>(
                r#"
                SELECT aa.attempt_id, at.status, q.points
                FROM attempt_answers aa
                JOIN assessment_attempts at ON at.id = aa.attempt_id
                JOIN questions q ON q.id = aa.question_id
                WHERE aa.id = $1
                "#,
            )
            .bind(answer_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Answer".to_string()))?;

        if attempt_status != AttemptStatus::Submitted {
            return Err(AppError::rule("Attempt is not awaiting grading"));
        }
        validate_manual_points(input.points_awarded, max_points).map_err(|msg| {
            AppError::validation(
                "points_awarded",
                msg,
                "Los puntos deben estar entre 0 y el valor de la pregunta",
            )
        })?;

        let answer = sqlx::query_as::<_, AttemptAnswer>(&format!(
            r#"
            UPDATE attempt_answers SET
                points_awarded = $2, is_correct = $3, feedback = COALESCE($4, feedback)
            WHERE id = $1
            RETURNING {}
            "#,
            ANSWER_COLUMNS
        ))
        .bind(answer_id)
        .bind(input.points_awarded)
        .bind(input.points_awarded == max_points)
        .bind(&input.feedback)
        .fetch_one(&self.db)
        .await?;

        let pending = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM attempt_answers WHERE attempt_id = $1 AND points_awarded IS NULL",
        )
        .bind(attempt_id)
        .fetch_one(&self.db)
        .await?;

        if pending == 0 {
            self.finalize(attempt_id, Some(graded_by)).await?;
        }

        Ok(answer)
    }

    // ========================================================================
    // Results and statistics
    // ========================================================================

    /// Attempt outcome; correct answers only when the assessment allows it
    pub async fn results(&self, attempt_id: Uuid) -> AppResult<AttemptResult> {
        let attempt = self.get_attempt(attempt_id).await?;
        if attempt.status == AttemptStatus::InProgress {
            return Err(AppError::rule("Attempt is still in progress"));
        }
        let assessment = self.get_assessment(attempt.assessment_id).await?;
        let reveal = assessment.show_correct_answers && attempt.status == AttemptStatus::Graded;

        let mut questions = self.questions_with_answers(attempt.assessment_id).await?;
        let recorded = sqlx::query_as::<_, AttemptAnswer>(&format!(
            "SELECT {} FROM attempt_answers WHERE attempt_id = $1",
            ANSWER_COLUMNS
        ))
        .bind(attempt_id)
        .fetch_all(&self.db)
        .await?;
        let mut recorded: HashMap<Uuid, AttemptAnswer> =
            recorded.into_iter().map(|a| (a.question_id, a)).collect();

        let mut results = Vec::with_capacity(attempt.question_order.len());
        for question_id in &attempt.question_order {
            let Some(index) = questions.iter().position(|q| q.question.id == *question_id) else {
                continue;
            };
            let QuestionWithAnswers { question, answers } = questions.swap_remove(index);
            let answer = recorded.remove(question_id);
            results.push(QuestionResult {
                question_id: question.id,
                question_type: question.question_type,
                text: question.text,
                points: question.points,
                selected_answers: answer
                    .as_ref()
                    .map(|a| a.selected_answers.clone())
                    .unwrap_or_default(),
                text_answer: answer.as_ref().and_then(|a| a.text_answer.clone()),
                is_correct: answer.as_ref().and_then(|a| a.is_correct),
                points_awarded: answer.as_ref().and_then(|a| a.points_awarded),
                feedback: answer.as_ref().and_then(|a| a.feedback.clone()),
                correct_answers: reveal
                    .then(|| correct_answer_ids(question.question_type, &answers)),
                explanation: reveal.then_some(question.explanation),
            });
        }

        Ok(AttemptResult {
            passing_score: assessment.passing_score,
            attempt,
            questions: results,
        })
    }

    /// Attempts of a user on an assessment
    pub async fn my_attempts(&self, assessment_id: Uuid, user_id: Uuid) -> AppResult<AttemptHistory> {
        let assessment = self.get_assessment(assessment_id).await?;
        let attempts = sqlx::query_as::<_, Attempt>(&format!(
            r#"
            SELECT {} FROM assessment_attempts
            WHERE assessment_id = $1 AND user_id = $2
            ORDER BY attempt_number
            "#,
            ATTEMPT_COLUMNS
        ))
        .bind(assessment_id)
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;

        let best_score = attempts.iter().filter_map(|a| a.score).max();
        let passed = attempts.iter().any(|a| a.passed == Some(true));

        Ok(AttemptHistory {
            max_attempts: assessment.max_attempts,
            attempts_remaining: attempts_remaining(assessment.max_attempts, attempts.len() as i64),
            best_score,
            passed,
            attempts,
        })
    }

    /// Aggregate attempt statistics
    pub async fn statistics(&self, assessment_id: Uuid) -> AppResult<AssessmentStatistics> {
        self.get_assessment(assessment_id).await?;

        let (total, graded, users, average, passed) =
            sqlx::query_as::<_, (i64, i64, i64, Option<Decimal>, i64)>(
                r#"
                SELECT
                    COUNT(*),
                    COUNT(*) FILTER (WHERE status = 'graded'),
                    COUNT(DISTINCT user_id),
                    AVG(score) FILTER (WHERE status = 'graded'),
                    COUNT(*) FILTER (WHERE status = 'graded' AND passed)
                FROM assessment_attempts
                WHERE assessment_id = $1
                "#,
            )
            .bind(assessment_id)
            .fetch_one(&self.db)
            .await?;

        let questions = sqlx::query_as::<_, QuestionStatistics>(
            r#"
            SELECT
                q.id AS question_id,
                q.text,
                COUNT(aa.id) AS answered,
                COUNT(aa.id) FILTER (WHERE aa.is_correct) AS correct,
                CASE WHEN COUNT(aa.id) = 0 THEN 0
                     ELSE ROUND(COUNT(aa.id) FILTER (WHERE aa.is_correct) * 100.0 / COUNT(aa.id), 2)
                END AS correct_rate
            FROM questions q
            LEFT JOIN attempt_answers aa ON aa.question_id = q.id
            WHERE q.assessment_id = $1
            GROUP BY q.id, q.text, q.sort_order
            ORDER BY q.sort_order
            "#,
        )
        .bind(assessment_id)
        .fetch_all(&self.db)
        .await?;

        Ok(AssessmentStatistics {
            assessment_id,
            total_attempts: total,
            graded_attempts: graded,
            unique_users: users,
            average_score: average.unwrap_or(Decimal::ZERO).round_dp(2),
            pass_rate: shared::models::completion_rate(passed, graded),
            questions,
        })
    }

    /// Free-text answers waiting for an instructor
    pub async fn pending_grading(&self, assessment_id: Option<Uuid>) -> AppResult<Vec<PendingAnswer>> {
        let pending = sqlx::query_as::<_, PendingAnswer>(
            r#"
            SELECT
                aa.id AS answer_id, at.id AS attempt_id, a.id AS assessment_id,
                a.title AS assessment_title, u.id AS user_id,
                u.first_name || ' ' || u.last_name AS user_name,
                q.id AS question_id, q.question_type, q.text AS question_text,
                q.points AS max_points, aa.text_answer, aa.answered_at
            FROM attempt_answers aa
            JOIN assessment_attempts at ON at.id = aa.attempt_id
            JOIN assessments a ON a.id = at.assessment_id
            JOIN questions q ON q.id = aa.question_id
            JOIN users u ON u.id = at.user_id
            WHERE at.status = 'submitted'
              AND aa.points_awarded IS NULL
              AND ($1::uuid IS NULL OR a.id = $1)
            ORDER BY aa.answered_at
            "#,
        )
        .bind(assessment_id)
        .fetch_all(&self.db)
        .await?;
        Ok(pending)
    }
}

fn check_question_input(input: &QuestionInput) -> AppResult<()> {
    if let Some(points) = input.points {
        if points <= Decimal::ZERO {
            return Err(AppError::validation(
                "points",
                "Points must be positive",
                "Los puntos deben ser positivos",
            ));
        }
    }
    let flags: Vec<bool> = input.answers.iter().map(|a| a.is_correct).collect();
    let flags = if input.question_type == QuestionType::Ordering {
        // Every option of an ordering question is part of the answer
        vec![true; flags.len()]
    } else {
        flags
    };
    validate_question(input.question_type, &flags)
        .map_err(|msg| AppError::validation("answers", msg, "Opciones de respuesta inválidas"))
}

async fn insert_answers(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    question_id: Uuid,
    answers: &[AnswerInput],
) -> AppResult<Vec<Answer>> {
    let mut created = Vec::with_capacity(answers.len());
    for (index, answer) in answers.iter().enumerate() {
        let row = sqlx::query_as::<_, Answer>(
            r#"
            INSERT INTO answers (question_id, text, is_correct, sort_order)
            VALUES ($1, $2, $3, $4)
            RETURNING id, question_id, text, is_correct, sort_order
            "#,
        )
        .bind(question_id)
        .bind(answer.text.trim())
        .bind(answer.is_correct)
        .bind(index as i32 + 1)
        .fetch_one(&mut **tx)
        .await?;
        created.push(row);
    }
    Ok(created)
}

/// Learner view of an attempt: questions in attempt order, no correctness flags
fn build_session(
    assessment: &Assessment,
    attempt: Attempt,
    mut questions: Vec<QuestionWithAnswers>,
) -> AttemptSession {
    let mut ordered = Vec::with_capacity(attempt.question_order.len());
    for question_id in &attempt.question_order {
        let Some(index) = questions.iter().position(|q| q.question.id == *question_id) else {
            continue;
        };
        let QuestionWithAnswers { question, answers } = questions.swap_remove(index);
        let mut options: Vec<LearnerAnswer> = answers
            .into_iter()
            .map(|a| LearnerAnswer { id: a.id, text: a.text })
            .collect();
        if assessment.shuffle_answers && question.question_type.allows_answer_shuffle() {
            shuffle(&mut options);
        }
        ordered.push(LearnerQuestion {
            id: question.id,
            question_type: question.question_type,
            text: question.text,
            points: question.points,
            answers: options,
        });
    }

    let expires_at = assessment
        .time_limit_minutes
        .filter(|m| *m > 0)
        .map(|m| attempt.started_at + Duration::minutes(i64::from(m)));

    AttemptSession {
        assessment_title: assessment.title.clone(),
        time_limit_minutes: assessment.time_limit_minutes,
        expires_at,
        attempt,
        questions: ordered,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn answer(question_id: Uuid, sort_order: i32, is_correct: bool) -> Answer {
        Answer {
            id: Uuid::new_v4(),
            question_id,
            text: format!("option {}", sort_order),
            is_correct,
            sort_order,
        }
    }

    #[test]
    fn test_correct_ids_for_choice() {
        let q = Uuid::new_v4();
        let answers = vec![answer(q, 2, true), answer(q, 1, false), answer(q, 3, true)];
        let correct = correct_answer_ids(QuestionType::MultipleChoice, &answers);
        assert_eq!(correct, vec![answers[0].id, answers[2].id]);
    }

    #[test]
    fn test_correct_ids_for_ordering_follow_sort_order() {
        let q = Uuid::new_v4();
        let answers = vec![answer(q, 3, false), answer(q, 1, false), answer(q, 2, false)];
        let correct = correct_answer_ids(QuestionType::Ordering, &answers);
        assert_eq!(correct, vec![answers[1].id, answers[2].id, answers[0].id]);
    }

    #[test]
    fn test_ordering_question_input_is_valid_without_flags() {
        let input = QuestionInput {
            question_type: QuestionType::Ordering,
            text: "Ordene los pasos del bloqueo".to_string(),
            explanation: None,
            points: None,
            sort_order: None,
            answers: vec![
                AnswerInput {
                    text: "Identificar".to_string(),
                    is_correct: false,
                },
                AnswerInput {
                    text: "Bloquear".to_string(),
                    is_correct: false,
                },
            ],
        };
        assert!(check_question_input(&input).is_ok());
    }

    #[test]
    fn test_session_hides_correctness_and_keeps_true_false_order() {
        let q = Uuid::new_v4();
        let now = Utc::now();
        let assessment = Assessment {
            id: Uuid::new_v4(),
            title: "Alturas".to_string(),
            description: String::new(),
            course_id: None,
            lesson_id: None,
            passing_score: 80,
            time_limit_minutes: Some(30),
            max_attempts: 3,
            shuffle_questions: false,
            shuffle_answers: true,
            show_correct_answers: true,
            status: AssessmentStatus::Published,
            created_by: None,
            created_at: now,
            updated_at: now,
        };
        let answers = vec![answer(q, 1, true), answer(q, 2, false)];
        let expected: Vec<Uuid> = answers.iter().map(|a| a.id).collect();
        let questions = vec![QuestionWithAnswers {
            question: Question {
                id: q,
                assessment_id: assessment.id,
                question_type: QuestionType::TrueFalse,
                text: "¿El arnés es obligatorio?".to_string(),
                explanation: String::new(),
                points: Decimal::ONE,
                sort_order: 1,
                created_at: now,
            },
            answers,
        }];
        let attempt = Attempt {
            id: Uuid::new_v4(),
            assessment_id: assessment.id,
            user_id: Uuid::new_v4(),
            attempt_number: 1,
            status: AttemptStatus::InProgress,
            score: None,
            passed: None,
            question_order: vec![q],
            started_at: now,
            submitted_at: None,
            graded_at: None,
            graded_by: None,
        };

        let session = build_session(&assessment, attempt, questions);
        let ids: Vec<Uuid> = session.questions[0].answers.iter().map(|a| a.id).collect();
        assert_eq!(ids, expected);
        assert_eq!(session.expires_at, Some(now + Duration::minutes(30)));

        let json = serde_json::to_string(&session).unwrap();
        assert!(!json.contains("is_correct"));
    }
}
