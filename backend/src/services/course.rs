//! Course content service (categories, courses, modules, lessons, versions)

use chrono::{DateTime, Utc};
use rand::Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::models::{
    check_archivable, check_publishable, check_structure_editable, completion_rate,
    duplicate_course_code, CourseStatus, CourseType, LessonType,
};
use shared::types::{Country, PaginatedResponse, Pagination};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};

/// Course content service
#[derive(Clone)]
pub struct CourseService {
    db: PgPool,
}

/// Course category
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub parent_id: Option<Uuid>,
    pub sort_order: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

const CATEGORY_COLUMNS: &str =
    "id, name, description, parent_id, sort_order, is_active, created_at";

/// Course record
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Course {
    pub id: Uuid,
    pub code: String,
    pub title: String,
    pub description: String,
    pub objectives: String,
    pub duration_hours: Decimal,
    pub course_type: CourseType,
    pub status: CourseStatus,
    pub version: i32,
    pub target_profiles: Vec<String>,
    pub validity_months: Option<i32>,
    pub country: Country,
    pub category_id: Option<Uuid>,
    pub thumbnail_url: Option<String>,
    pub created_by: Option<Uuid>,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Course module
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Module {
    pub id: Uuid,
    pub course_id: Uuid,
    pub title: String,
    pub description: String,
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
}

/// Lesson record
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Lesson {
    pub id: Uuid,
    pub module_id: Uuid,
    pub title: String,
    pub description: String,
    pub lesson_type: LessonType,
    pub content: String,
    pub content_url: Option<String>,
    pub duration_minutes: i32,
    pub sort_order: i32,
    pub is_mandatory: bool,
    pub is_offline_available: bool,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Prerequisite summary
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CourseRef {
    pub id: Uuid,
    pub code: String,
    pub title: String,
}

/// Module with its lessons
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleWithLessons {
    #[serde(flatten)]
    pub module: Module,
    pub lessons: Vec<Lesson>,
}

/// Full course tree
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseDetail {
    #[serde(flatten)]
    pub course: Course,
    pub prerequisites: Vec<CourseRef>,
    pub modules: Vec<ModuleWithLessons>,
    pub total_lessons: usize,
    pub total_duration_minutes: i64,
}

/// Published snapshot of a course
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct CourseVersion {
    pub id: Uuid,
    pub course_id: Uuid,
    pub version: i32,
    pub snapshot: serde_json::Value,
    pub changelog: String,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Enrollment statistics for a course
#[derive(Debug, Clone, Serialize)]
pub struct CourseStatistics {
    pub course_id: Uuid,
    pub total_enrollments: i64,
    pub enrolled: i64,
    pub in_progress: i64,
    pub completed: i64,
    pub expired: i64,
    pub dropped: i64,
    pub completion_rate: Decimal,
    pub average_progress: Decimal,
}

/// Input for creating a category
#[derive(Debug, Deserialize, Validate)]
pub struct CreateCategoryInput {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    pub description: Option<String>,
    pub parent_id: Option<Uuid>,
    pub sort_order: Option<i32>,
}

/// Input for updating a category; `parent_id: null` keeps the current parent
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateCategoryInput {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    pub description: Option<String>,
    pub parent_id: Option<Uuid>,
    #[serde(default)]
    pub clear_parent: bool,
    pub sort_order: Option<i32>,
    pub is_active: Option<bool>,
}

/// A category may not sit under itself or under one of its descendants.
/// `parent_chain` is the new parent followed by its ancestors.
pub(crate) fn check_category_parent(category_id: Uuid, parent_chain: &[Uuid]) -> AppResult<()> {
    if parent_chain.contains(&category_id) {
        return Err(AppError::validation(
            "parent_id",
            "A category cannot be nested under itself",
            "Una categoría no puede anidarse dentro de sí misma",
        ));
    }
    Ok(())
}

/// Input for creating a course
#[derive(Debug, Deserialize, Validate)]
pub struct CreateCourseInput {
    pub code: String,
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    pub description: Option<String>,
    pub objectives: Option<String>,
    pub duration_hours: Option<Decimal>,
    pub course_type: Option<CourseType>,
    pub target_profiles: Option<Vec<String>>,
    pub prerequisite_ids: Option<Vec<Uuid>>,
    #[validate(range(min = 0, max = 120))]
    pub validity_months: Option<i32>,
    pub country: Option<Country>,
    pub category_id: Option<Uuid>,
    pub thumbnail_url: Option<String>,
}

/// Input for updating a course
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateCourseInput {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    pub description: Option<String>,
    pub objectives: Option<String>,
    pub duration_hours: Option<Decimal>,
    pub course_type: Option<CourseType>,
    pub target_profiles: Option<Vec<String>>,
    pub prerequisite_ids: Option<Vec<Uuid>>,
    #[validate(range(min = 0, max = 120))]
    pub validity_months: Option<i32>,
    pub country: Option<Country>,
    pub category_id: Option<Uuid>,
    pub thumbnail_url: Option<String>,
}

/// Input for creating or updating a module
#[derive(Debug, Deserialize, Validate)]
pub struct ModuleInput {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    pub description: Option<String>,
    pub sort_order: Option<i32>,
}

/// Input for creating or updating a lesson
#[derive(Debug, Deserialize, Validate)]
pub struct LessonInput {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    pub description: Option<String>,
    pub lesson_type: Option<LessonType>,
    pub content: Option<String>,
    pub content_url: Option<String>,
    #[validate(range(min = 0))]
    pub duration_minutes: Option<i32>,
    pub sort_order: Option<i32>,
    pub is_mandatory: Option<bool>,
    pub is_offline_available: Option<bool>,
    pub metadata: Option<serde_json::Value>,
}

/// Filters for listing courses
#[derive(Debug, Default, Deserialize)]
pub struct CourseFilters {
    pub status: Option<CourseStatus>,
    pub course_type: Option<CourseType>,
    pub category_id: Option<Uuid>,
    pub country: Option<Country>,
    pub target_profile: Option<String>,
    pub search: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

const COURSE_COLUMNS: &str = r#"
    id, code, title, description, objectives, duration_hours, course_type, status,
    version, target_profiles, validity_months, country, category_id, thumbnail_url,
    created_by, published_at, created_at, updated_at
"#;

const LESSON_COLUMNS: &str = r#"
    id, module_id, title, description, lesson_type, content, content_url,
    duration_minutes, sort_order, is_mandatory, is_offline_available, metadata,
    created_at, updated_at
"#;

impl CourseService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    // ========================================================================
    // Categories
    // ========================================================================

    /// List active categories
    pub async fn list_categories(&self) -> AppResult<Vec<Category>> {
        let categories = sqlx::query_as::<_, Category>(&format!(
            r#"
            SELECT {}
            FROM course_categories
            WHERE is_active = true
            ORDER BY sort_order, name
            "#,
            CATEGORY_COLUMNS
        ))
        .fetch_all(&self.db)
        .await?;
        Ok(categories)
    }

    /// Create a category
    pub async fn create_category(&self, input: CreateCategoryInput) -> AppResult<Category> {
        input.validate()?;
        let category = sqlx::query_as::<_, Category>(&format!(
            r#"
            INSERT INTO course_categories (name, description, parent_id, sort_order)
            VALUES ($1, $2, $3, $4)
            RETURNING {}
            "#,
            CATEGORY_COLUMNS
        ))
        .bind(input.name.trim())
        .bind(&input.description)
        .bind(input.parent_id)
        .bind(input.sort_order.unwrap_or(0))
        .fetch_one(&self.db)
        .await?;
        Ok(category)
    }

    /// Get a category, active or not
    pub async fn get_category(&self, category_id: Uuid) -> AppResult<Category> {
        sqlx::query_as::<_, Category>(&format!(
            "SELECT {} FROM course_categories WHERE id = $1",
            CATEGORY_COLUMNS
        ))
        .bind(category_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Category".to_string()))
    }

    /// Update a category
    pub async fn update_category(
        &self,
        category_id: Uuid,
        input: UpdateCategoryInput,
    ) -> AppResult<Category> {
        input.validate()?;
        self.get_category(category_id).await?;

        if let Some(parent_id) = input.parent_id {
            let chain = sqlx::query_scalar::<_, Uuid>(
                r#"
                WITH RECURSIVE chain AS (
                    SELECT id, parent_id FROM course_categories WHERE id = $1
                    UNION
                    SELECT c.id, c.parent_id
                    FROM course_categories c
                    JOIN chain ON c.id = chain.parent_id
                )
                SELECT id FROM chain
                "#,
            )
            .bind(parent_id)
            .fetch_all(&self.db)
            .await?;
            if chain.is_empty() {
                return Err(AppError::NotFound("Parent category".to_string()));
            }
            check_category_parent(category_id, &chain)?;
        }

        let category = sqlx::query_as::<_, Category>(&format!(
            r#"
            UPDATE course_categories SET
                name = COALESCE($2, name),
                description = COALESCE($3, description),
                parent_id = CASE WHEN $4 THEN NULL ELSE COALESCE($5, parent_id) END,
                sort_order = COALESCE($6, sort_order),
                is_active = COALESCE($7, is_active)
            WHERE id = $1
            RETURNING {}
            "#,
            CATEGORY_COLUMNS
        ))
        .bind(category_id)
        .bind(input.name.as_deref().map(str::trim))
        .bind(&input.description)
        .bind(input.clear_parent)
        .bind(input.parent_id)
        .bind(input.sort_order)
        .bind(input.is_active)
        .fetch_one(&self.db)
        .await?;
        Ok(category)
    }

    /// Delete a category; its courses and subcategories are left without one
    pub async fn delete_category(&self, category_id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM course_categories WHERE id = $1")
            .bind(category_id)
            .execute(&self.db)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Category".to_string()));
        }
        tracing::info!(category_id = %category_id, "Category deleted");
        Ok(())
    }

    // ========================================================================
    // Courses
    // ========================================================================

    /// Get a course record
    pub async fn get_course(&self, course_id: Uuid) -> AppResult<Course> {
        sqlx::query_as::<_, Course>(&format!(
            "SELECT {} FROM courses WHERE id = $1",
            COURSE_COLUMNS
        ))
        .bind(course_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Course".to_string()))
    }

    /// Get a course with prerequisites, modules and lessons
    pub async fn get_course_detail(&self, course_id: Uuid) -> AppResult<CourseDetail> {
        let course = self.get_course(course_id).await?;

        let prerequisites = self.prerequisites(course_id).await?;

        let modules = sqlx::query_as::<_, Module>(
            r#"
            SELECT id, course_id, title, description, sort_order, created_at
            FROM course_modules
            WHERE course_id = $1
            ORDER BY sort_order, created_at
            "#,
        )
        .bind(course_id)
        .fetch_all(&self.db)
        .await?;

        let lessons = sqlx::query_as::<_, Lesson>(&format!(
            r#"
            SELECT {}
            FROM lessons
            WHERE module_id IN (SELECT id FROM course_modules WHERE course_id = $1)
            ORDER BY sort_order, created_at
            "#,
            LESSON_COLUMNS
        ))
        .bind(course_id)
        .fetch_all(&self.db)
        .await?;

        let total_lessons = lessons.len();
        let total_duration_minutes = lessons.iter().map(|l| i64::from(l.duration_minutes)).sum();

        let modules = modules
            .into_iter()
            .map(|module| {
                let lessons = lessons
                    .iter()
                    .filter(|l| l.module_id == module.id)
                    .cloned()
                    .collect();
                ModuleWithLessons { module, lessons }
            })
            .collect();

        Ok(CourseDetail {
            course,
            prerequisites,
            modules,
            total_lessons,
            total_duration_minutes,
        })
    }

    /// Prerequisite courses of a course
    pub async fn prerequisites(&self, course_id: Uuid) -> AppResult<Vec<CourseRef>> {
        let prerequisites = sqlx::query_as::<_, CourseRef>(
            r#"
            SELECT c.id, c.code, c.title
            FROM course_prerequisites cp
            JOIN courses c ON c.id = cp.prerequisite_id
            WHERE cp.course_id = $1
            ORDER BY c.code
            "#,
        )
        .bind(course_id)
        .fetch_all(&self.db)
        .await?;
        Ok(prerequisites)
    }

    /// List courses with filters and pagination
    pub async fn list_courses(&self, filters: CourseFilters) -> AppResult<PaginatedResponse<Course>> {
        let pagination = Pagination::from_query(filters.page, filters.per_page);
        let search = filters.search.as_ref().map(|s| format!("%{}%", s.trim()));
        let profile = filters
            .target_profile
            .as_deref()
            .map(crate::services::user::normalize_profile);

        const FILTER: &str = r#"
            WHERE ($1::course_status IS NULL OR status = $1)
              AND ($2::course_type IS NULL OR course_type = $2)
              AND ($3::uuid IS NULL OR category_id = $3)
              AND ($4::country_code IS NULL OR country = $4)
              AND ($5::text IS NULL OR $5 = ANY(target_profiles))
              AND ($6::text IS NULL OR title ILIKE $6 OR code ILIKE $6 OR description ILIKE $6)
        "#;

        let total = sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM courses {}", FILTER))
            .bind(filters.status)
            .bind(filters.course_type)
            .bind(filters.category_id)
            .bind(filters.country)
            .bind(&profile)
            .bind(&search)
            .fetch_one(&self.db)
            .await?;

        let courses = sqlx::query_as::<_, Course>(&format!(
            "SELECT {} FROM courses {} ORDER BY title LIMIT $7 OFFSET $8",
            COURSE_COLUMNS, FILTER
        ))
        .bind(filters.status)
        .bind(filters.course_type)
        .bind(filters.category_id)
        .bind(filters.country)
        .bind(&profile)
        .bind(&search)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.db)
        .await?;

        Ok(PaginatedResponse::new(courses, &pagination, total.max(0) as u64))
    }

    /// Create a draft course
    pub async fn create_course(&self, created_by: Uuid, input: CreateCourseInput) -> AppResult<Course> {
        input.validate()?;
        shared::validate_course_code(&input.code)
            .map_err(|msg| AppError::validation("code", msg, "Código de curso inválido"))?;

        let existing = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM courses WHERE code = $1")
            .bind(&input.code)
            .fetch_one(&self.db)
            .await?;
        if existing > 0 {
            return Err(AppError::DuplicateEntry("code".to_string()));
        }

        let profiles = normalize_profiles(input.target_profiles.unwrap_or_default());

        let mut tx = self.db.begin().await?;

        let course = sqlx::query_as::<_, Course>(&format!(
            r#"
            INSERT INTO courses (
                code, title, description, objectives, duration_hours, course_type,
                target_profiles, validity_months, country, category_id, thumbnail_url, created_by
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING {}
            "#,
            COURSE_COLUMNS
        ))
        .bind(&input.code)
        .bind(input.title.trim())
        .bind(input.description.unwrap_or_default())
        .bind(input.objectives.unwrap_or_default())
        .bind(input.duration_hours.unwrap_or(Decimal::ZERO))
        .bind(input.course_type.unwrap_or(CourseType::Mandatory))
        .bind(&profiles)
        .bind(input.validity_months)
        .bind(input.country.unwrap_or_default())
        .bind(input.category_id)
        .bind(&input.thumbnail_url)
        .bind(created_by)
        .fetch_one(&mut *tx)
        .await?;

        if let Some(prerequisite_ids) = input.prerequisite_ids {
            replace_prerequisites(&mut tx, course.id, &prerequisite_ids).await?;
        }

        tx.commit().await?;

        tracing::info!(course_id = %course.id, code = %course.code, "Course created");

        Ok(course)
    }

    /// Update course metadata
    pub async fn update_course(&self, course_id: Uuid, input: UpdateCourseInput) -> AppResult<Course> {
        input.validate()?;
        self.get_course(course_id).await?;

        let profiles = input.target_profiles.map(normalize_profiles);

        let mut tx = self.db.begin().await?;

        let course = sqlx::query_as::<_, Course>(&format!(
            r#"
            UPDATE courses SET
                title = COALESCE($2, title),
                description = COALESCE($3, description),
                objectives = COALESCE($4, objectives),
                duration_hours = COALESCE($5, duration_hours),
                course_type = COALESCE($6, course_type),
                target_profiles = COALESCE($7, target_profiles),
                validity_months = COALESCE($8, validity_months),
                country = COALESCE($9, country),
                category_id = COALESCE($10, category_id),
                thumbnail_url = COALESCE($11, thumbnail_url),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            COURSE_COLUMNS
        ))
        .bind(course_id)
        .bind(&input.title)
        .bind(&input.description)
        .bind(&input.objectives)
        .bind(input.duration_hours)
        .bind(input.course_type)
        .bind(&profiles)
        .bind(input.validity_months)
        .bind(input.country)
        .bind(input.category_id)
        .bind(&input.thumbnail_url)
        .fetch_one(&mut *tx)
        .await?;

        if let Some(prerequisite_ids) = input.prerequisite_ids {
            replace_prerequisites(&mut tx, course_id, &prerequisite_ids).await?;
        }

        tx.commit().await?;
        Ok(course)
    }

    /// Delete a draft course without enrollments
    pub async fn delete_course(&self, course_id: Uuid) -> AppResult<()> {
        let course = self.get_course(course_id).await?;
        check_structure_editable(course.status).map_err(AppError::rule)?;

        let enrollments =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM enrollments WHERE course_id = $1")
                .bind(course_id)
                .fetch_one(&self.db)
                .await?;
        if enrollments > 0 {
            return Err(AppError::rule("Course has enrollments and cannot be deleted"));
        }

        sqlx::query("DELETE FROM courses WHERE id = $1")
            .bind(course_id)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    // ========================================================================
    // Modules and lessons
    // ========================================================================

    async fn ensure_editable(&self, course_id: Uuid) -> AppResult<()> {
        let course = self.get_course(course_id).await?;
        check_structure_editable(course.status).map_err(AppError::rule)
    }

    /// Add a module to a draft course
    pub async fn add_module(&self, course_id: Uuid, input: ModuleInput) -> AppResult<Module> {
        input.validate()?;
        self.ensure_editable(course_id).await?;

        let title = input
            .title
            .ok_or_else(|| AppError::validation("title", "Title is required", "El título es obligatorio"))?;

        let module = sqlx::query_as::<_, Module>(
            r#"
            INSERT INTO course_modules (course_id, title, description, sort_order)
            VALUES (
                $1, $2, $3,
                COALESCE($4, (SELECT COALESCE(MAX(sort_order), 0) + 1 FROM course_modules WHERE course_id = $1))
            )
            RETURNING id, course_id, title, description, sort_order, created_at
            "#,
        )
        .bind(course_id)
        .bind(title.trim())
        .bind(input.description.unwrap_or_default())
        .bind(input.sort_order)
        .fetch_one(&self.db)
        .await?;
        Ok(module)
    }

    /// Update a module
    pub async fn update_module(
        &self,
        course_id: Uuid,
        module_id: Uuid,
        input: ModuleInput,
    ) -> AppResult<Module> {
        input.validate()?;
        self.ensure_editable(course_id).await?;

        sqlx::query_as::<_, Module>(
            r#"
            UPDATE course_modules SET
                title = COALESCE($3, title),
                description = COALESCE($4, description),
                sort_order = COALESCE($5, sort_order)
            WHERE id = $2 AND course_id = $1
            RETURNING id, course_id, title, description, sort_order, created_at
            "#,
        )
        .bind(course_id)
        .bind(module_id)
        .bind(&input.title)
        .bind(&input.description)
        .bind(input.sort_order)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Module".to_string()))
    }

    /// Delete a module and its lessons
    pub async fn delete_module(&self, course_id: Uuid, module_id: Uuid) -> AppResult<()> {
        self.ensure_editable(course_id).await?;
        let result = sqlx::query("DELETE FROM course_modules WHERE id = $2 AND course_id = $1")
            .bind(course_id)
            .bind(module_id)
            .execute(&self.db)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Module".to_string()));
        }
        Ok(())
    }

    /// Add a lesson to a module
    pub async fn add_lesson(
        &self,
        course_id: Uuid,
        module_id: Uuid,
        input: LessonInput,
    ) -> AppResult<Lesson> {
        input.validate()?;
        self.ensure_editable(course_id).await?;
        self.ensure_module_in_course(course_id, module_id).await?;

        let title = input
            .title
            .ok_or_else(|| AppError::validation("title", "Title is required", "El título es obligatorio"))?;

        let lesson = sqlx::query_as::<_, Lesson>(&format!(
            r#"
            INSERT INTO lessons (
                module_id, title, description, lesson_type, content, content_url,
                duration_minutes, sort_order, is_mandatory, is_offline_available, metadata
            )
            VALUES (
                $1, $2, $3, $4, $5, $6, $7,
                COALESCE($8, (SELECT COALESCE(MAX(sort_order), 0) + 1 FROM lessons WHERE module_id = $1)),
                $9, $10, $11
            )
            RETURNING {}
            "#,
            LESSON_COLUMNS
        ))
        .bind(module_id)
        .bind(title.trim())
        .bind(input.description.unwrap_or_default())
        .bind(input.lesson_type.unwrap_or(LessonType::Text))
        .bind(input.content.unwrap_or_default())
        .bind(&input.content_url)
        .bind(input.duration_minutes.unwrap_or(0))
        .bind(input.sort_order)
        .bind(input.is_mandatory.unwrap_or(true))
        .bind(input.is_offline_available.unwrap_or(true))
        .bind(input.metadata.unwrap_or_else(|| serde_json::json!({})))
        .fetch_one(&self.db)
        .await?;
        Ok(lesson)
    }

    /// Update a lesson
    pub async fn update_lesson(
        &self,
        course_id: Uuid,
        lesson_id: Uuid,
        input: LessonInput,
    ) -> AppResult<Lesson> {
        input.validate()?;
        self.ensure_editable(course_id).await?;

        sqlx::query_as::<_, Lesson>(&format!(
            r#"
            UPDATE lessons SET
                title = COALESCE($3, title),
                description = COALESCE($4, description),
                lesson_type = COALESCE($5, lesson_type),
                content = COALESCE($6, content),
                content_url = COALESCE($7, content_url),
                duration_minutes = COALESCE($8, duration_minutes),
                sort_order = COALESCE($9, sort_order),
                is_mandatory = COALESCE($10, is_mandatory),
                is_offline_available = COALESCE($11, is_offline_available),
                metadata = COALESCE($12, metadata),
                updated_at = NOW()
            WHERE id = $2
              AND module_id IN (SELECT id FROM course_modules WHERE course_id = $1)
            RETURNING {}
            "#,
            LESSON_COLUMNS
        ))
        .bind(course_id)
        .bind(lesson_id)
        .bind(&input.title)
        .bind(&input.description)
        .bind(input.lesson_type)
        .bind(&input.content)
        .bind(&input.content_url)
        .bind(input.duration_minutes)
        .bind(input.sort_order)
        .bind(input.is_mandatory)
        .bind(input.is_offline_available)
        .bind(&input.metadata)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Lesson".to_string()))
    }

    /// Delete a lesson
    pub async fn delete_lesson(&self, course_id: Uuid, lesson_id: Uuid) -> AppResult<()> {
        self.ensure_editable(course_id).await?;
        let result = sqlx::query(
            r#"
            DELETE FROM lessons
            WHERE id = $2
              AND module_id IN (SELECT id FROM course_modules WHERE course_id = $1)
            "#,
        )
        .bind(course_id)
        .bind(lesson_id)
        .execute(&self.db)
        .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Lesson".to_string()));
        }
        Ok(())
    }

    async fn ensure_module_in_course(&self, course_id: Uuid, module_id: Uuid) -> AppResult<()> {
        let exists = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM course_modules WHERE id = $1 AND course_id = $2",
        )
        .bind(module_id)
        .bind(course_id)
        .fetch_one(&self.db)
        .await?;
        if exists == 0 {
            return Err(AppError::NotFound("Module".to_string()));
        }
        Ok(())
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Publish a course: snapshot, bump version, stamp publication date
    pub async fn publish(
        &self,
        course_id: Uuid,
        published_by: Uuid,
        changelog: Option<String>,
    ) -> AppResult<Course> {
        let detail = self.get_course_detail(course_id).await?;
        check_publishable(detail.course.status, detail.total_lessons as i64)
            .map_err(AppError::rule)?;

        let snapshot = serde_json::to_value(&detail)
            .map_err(|e| AppError::Internal(format!("Snapshot serialization failed: {}", e)))?;

        let mut tx = self.db.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO course_versions (course_id, version, snapshot, changelog, created_by)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(course_id)
        .bind(detail.course.version)
        .bind(&snapshot)
        .bind(changelog.unwrap_or_default())
        .bind(published_by)
        .execute(&mut *tx)
        .await?;

        let course = sqlx::query_as::<_, Course>(&format!(
            r#"
            UPDATE courses SET
                status = 'published',
                published_at = NOW(),
                version = version + 1,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            COURSE_COLUMNS
        ))
        .bind(course_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(course_id = %course_id, version = course.version, "Course published");

        Ok(course)
    }

    /// Archive a course
    pub async fn archive(&self, course_id: Uuid) -> AppResult<Course> {
        let course = self.get_course(course_id).await?;
        check_archivable(course.status).map_err(AppError::rule)?;

        let course = sqlx::query_as::<_, Course>(&format!(
            "UPDATE courses SET status = 'archived', updated_at = NOW() WHERE id = $1 RETURNING {}",
            COURSE_COLUMNS
        ))
        .bind(course_id)
        .fetch_one(&self.db)
        .await?;
        Ok(course)
    }

    /// Return a published or archived course to draft so its structure can be edited
    pub async fn unpublish(&self, course_id: Uuid) -> AppResult<Course> {
        let course = self.get_course(course_id).await?;
        if course.status == CourseStatus::Draft {
            return Err(AppError::InvalidStateTransition(
                "Course is already a draft".to_string(),
            ));
        }
        let course = sqlx::query_as::<_, Course>(&format!(
            "UPDATE courses SET status = 'draft', updated_at = NOW() WHERE id = $1 RETURNING {}",
            COURSE_COLUMNS
        ))
        .bind(course_id)
        .fetch_one(&self.db)
        .await?;
        Ok(course)
    }

    /// Duplicate a course with its modules and lessons as a new draft
    pub async fn duplicate(&self, course_id: Uuid, created_by: Uuid) -> AppResult<Course> {
        let detail = self.get_course_detail(course_id).await?;
        let source = &detail.course;
        let suffix = format!("{:06X}", rand::rng().random::<u32>() & 0x00FF_FFFF);
        let new_code = duplicate_course_code(&source.code, &suffix);

        let mut tx = self.db.begin().await?;

        let copy = sqlx::query_as::<_, Course>(&format!(
            r#"
            INSERT INTO courses (
                code, title, description, objectives, duration_hours, course_type,
                target_profiles, validity_months, country, category_id, thumbnail_url, created_by
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING {}
            "#,
            COURSE_COLUMNS
        ))
        .bind(&new_code)
        .bind(format!("{} (Copy)", source.title))
        .bind(&source.description)
        .bind(&source.objectives)
        .bind(source.duration_hours)
        .bind(source.course_type)
        .bind(&source.target_profiles)
        .bind(source.validity_months)
        .bind(source.country)
        .bind(source.category_id)
        .bind(&source.thumbnail_url)
        .bind(created_by)
        .fetch_one(&mut *tx)
        .await?;

        let prerequisite_ids: Vec<Uuid> = detail.prerequisites.iter().map(|p| p.id).collect();
        replace_prerequisites(&mut tx, copy.id, &prerequisite_ids).await?;

        for entry in &detail.modules {
            let module_id = sqlx::query_scalar::<_, Uuid>(
                r#"
                INSERT INTO course_modules (course_id, title, description, sort_order)
                VALUES ($1, $2, $3, $4)
                RETURNING id
                "#,
            )
            .bind(copy.id)
            .bind(&entry.module.title)
            .bind(&entry.module.description)
            .bind(entry.module.sort_order)
            .fetch_one(&mut *tx)
            .await?;

            for lesson in &entry.lessons {
                sqlx::query(
                    r#"
                    INSERT INTO lessons (
                        module_id, title, description, lesson_type, content, content_url,
                        duration_minutes, sort_order, is_mandatory, is_offline_available, metadata
                    )
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                    "#,
                )
                .bind(module_id)
                .bind(&lesson.title)
                .bind(&lesson.description)
                .bind(lesson.lesson_type)
                .bind(&lesson.content)
                .bind(&lesson.content_url)
                .bind(lesson.duration_minutes)
                .bind(lesson.sort_order)
                .bind(lesson.is_mandatory)
                .bind(lesson.is_offline_available)
                .bind(&lesson.metadata)
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;

        tracing::info!(source = %course_id, copy = %copy.id, code = %copy.code, "Course duplicated");

        Ok(copy)
    }

    /// Published versions of a course, newest first
    pub async fn versions(&self, course_id: Uuid) -> AppResult<Vec<CourseVersion>> {
        self.get_course(course_id).await?;
        let versions = sqlx::query_as::<_, CourseVersion>(
            r#"
            SELECT id, course_id, version, snapshot, changelog, created_by, created_at
            FROM course_versions
            WHERE course_id = $1
            ORDER BY version DESC
            "#,
        )
        .bind(course_id)
        .fetch_all(&self.db)
        .await?;
        Ok(versions)
    }

    /// Enrollment statistics for a course
    pub async fn statistics(&self, course_id: Uuid) -> AppResult<CourseStatistics> {
        self.get_course(course_id).await?;

        let (total, enrolled, in_progress, completed, expired, dropped, average_progress) =
            sqlx::query_as::<_, (i64, i64, i64, i64, i64, i64, Option<Decimal>)>(
                r#"
                SELECT
                    COUNT(*),
                    COUNT(*) FILTER (WHERE status = 'enrolled'),
                    COUNT(*) FILTER (WHERE status = 'in_progress'),
                    COUNT(*) FILTER (WHERE status = 'completed'),
                    COUNT(*) FILTER (WHERE status = 'expired'),
                    COUNT(*) FILTER (WHERE status = 'dropped'),
                    AVG(progress)
                FROM enrollments
                WHERE course_id = $1
                "#,
            )
            .bind(course_id)
            .fetch_one(&self.db)
            .await?;

        Ok(CourseStatistics {
            course_id,
            total_enrollments: total,
            enrolled,
            in_progress,
            completed,
            expired,
            dropped,
            completion_rate: completion_rate(completed, total),
            average_progress: average_progress.unwrap_or(Decimal::ZERO).round_dp(2),
        })
    }
}

/// Replace the prerequisite set of a course
async fn replace_prerequisites(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    course_id: Uuid,
    prerequisite_ids: &[Uuid],
) -> AppResult<()> {
    if prerequisite_ids.contains(&course_id) {
        return Err(AppError::validation(
            "prerequisite_ids",
            "A course cannot be its own prerequisite",
            "Un curso no puede ser prerrequisito de sí mismo",
        ));
    }

    sqlx::query("DELETE FROM course_prerequisites WHERE course_id = $1")
        .bind(course_id)
        .execute(&mut **tx)
        .await?;

    if !prerequisite_ids.is_empty() {
        sqlx::query(
            r#"
            INSERT INTO course_prerequisites (course_id, prerequisite_id)
            SELECT $1, UNNEST($2::uuid[])
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(course_id)
        .bind(prerequisite_ids)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

fn normalize_profiles(profiles: Vec<String>) -> Vec<String> {
    let mut normalized: Vec<String> = profiles
        .iter()
        .map(|p| crate::services::user::normalize_profile(p))
        .filter(|p| !p.is_empty())
        .collect();
    normalized.sort();
    normalized.dedup();
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_parent_cycles() {
        let root = Uuid::new_v4();
        let child = Uuid::new_v4();
        let grandchild = Uuid::new_v4();

        // Moving root under its own grandchild: chain is grandchild -> child -> root
        assert!(check_category_parent(root, &[grandchild, child, root]).is_err());
        assert!(check_category_parent(root, &[root]).is_err());
        // Moving grandchild directly under root is fine
        assert!(check_category_parent(grandchild, &[root]).is_ok());
    }

    #[test]
    fn test_update_category_input() {
        let input: UpdateCategoryInput =
            serde_json::from_str(r#"{"is_active": false, "clear_parent": true}"#).unwrap();
        assert_eq!(input.is_active, Some(false));
        assert!(input.clear_parent);
        assert!(input.parent_id.is_none());
        assert!(input.validate().is_ok());

        let blank: UpdateCategoryInput = serde_json::from_str(r#"{"name": ""}"#).unwrap();
        assert!(blank.validate().is_err());
    }

    #[test]
    fn test_normalize_profiles() {
        let profiles = normalize_profiles(vec![
            "liniero".to_string(),
            "LINIERO".to_string(),
            " jefe cuadrilla".to_string(),
            "".to_string(),
        ]);
        assert_eq!(profiles, vec!["JEFE_CUADRILLA", "LINIERO"]);
    }
}
