//! Route definitions for the training platform API

use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};

use crate::handlers::{
    assessment, auth, certificate, course, enrollment, gamification, health, learning_path,
    notification, reporting, sync, user,
};
use crate::{middleware::auth_middleware, AppState};

/// Create API routes
pub fn api_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        // Readiness probe (public)
        .route("/health", get(health::readiness))
        // Auth routes (public login/refresh, protected profile)
        .nest("/auth", auth_routes(state))
        // Public certificate verification (QR codes and shared links)
        .route("/verify/:number", get(certificate::verify_certificate))
        .nest("/users", user_routes(state))
        .nest("/courses", course_routes(state))
        .nest("/enrollments", enrollment_routes(state))
        .nest("/assessments", assessment_routes(state))
        .nest("/certificates", certificate_routes(state))
        .nest("/learning-paths", learning_path_routes(state))
        .nest("/sync", sync_routes(state))
        .nest("/notifications", notification_routes(state))
        .nest("/gamification", gamification_routes(state))
        .nest("/reports", report_routes(state))
}

/// Authentication routes
fn auth_routes(state: &AppState) -> Router<AppState> {
    let protected = Router::new()
        .route("/me", get(auth::me))
        .route("/change-password", post(auth::change_password))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .route("/login", post(auth::login))
        .route("/refresh", post(auth::refresh))
        .route("/logout", post(auth::logout))
        .merge(protected)
}

/// User administration routes (protected)
fn user_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(user::list_users).post(user::create_user))
        .route(
            "/:user_id",
            get(user::get_user)
                .put(user::update_user)
                .delete(user::deactivate_user),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
}

/// Course catalog and authoring routes (protected)
fn course_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(course::list_courses).post(course::create_course))
        .route(
            "/categories",
            get(course::list_categories).post(course::create_category),
        )
        .route(
            "/categories/:category_id",
            get(course::get_category)
                .put(course::update_category)
                .delete(course::delete_category),
        )
        .route(
            "/:course_id",
            get(course::get_course)
                .put(course::update_course)
                .delete(course::delete_course),
        )
        .route("/:course_id/publish", post(course::publish_course))
        .route("/:course_id/unpublish", post(course::unpublish_course))
        .route("/:course_id/archive", post(course::archive_course))
        .route("/:course_id/duplicate", post(course::duplicate_course))
        .route("/:course_id/versions", get(course::list_versions))
        .route("/:course_id/statistics", get(course::course_statistics))
        .route("/:course_id/modules", post(course::add_module))
        .route(
            "/:course_id/modules/:module_id",
            put(course::update_module).delete(course::delete_module),
        )
        .route(
            "/:course_id/modules/:module_id/lessons",
            post(course::add_lesson),
        )
        .route(
            "/:course_id/lessons/:lesson_id",
            put(course::update_lesson).delete(course::delete_lesson),
        )
        .route(
            "/:course_id/offline-package",
            get(sync::download_package).post(sync::build_package),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
}

/// Enrollment and progress routes (protected)
fn enrollment_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(enrollment::list_enrollments).post(enrollment::enroll))
        .route("/me", get(enrollment::my_enrollments))
        .route(
            "/:enrollment_id",
            get(enrollment::get_enrollment).delete(enrollment::drop_enrollment),
        )
        .route("/:enrollment_id/progress", post(enrollment::update_progress))
        .route(
            "/progress/:progress_id/evidence",
            get(enrollment::list_evidence).post(enrollment::upload_evidence),
        )
        .route("/evidence/:evidence_id/verify", post(enrollment::verify_evidence))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
}

/// Assessment authoring, attempts and grading (protected)
fn assessment_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(assessment::list_assessments).post(assessment::create_assessment),
        )
        .route("/grading/pending", get(assessment::pending_grading))
        .route("/answers/:answer_id/grade", post(assessment::grade_answer))
        .route(
            "/attempts/:attempt_id",
            get(assessment::get_attempt),
        )
        .route("/attempts/:attempt_id/answers", post(assessment::submit_answer))
        .route("/attempts/:attempt_id/submit", post(assessment::submit_attempt))
        .route("/attempts/:attempt_id/results", get(assessment::attempt_results))
        .route(
            "/:assessment_id",
            get(assessment::get_assessment)
                .put(assessment::update_assessment)
                .delete(assessment::delete_assessment),
        )
        .route("/:assessment_id/status", put(assessment::set_assessment_status))
        .route("/:assessment_id/statistics", get(assessment::assessment_statistics))
        .route("/:assessment_id/questions", post(assessment::add_question))
        .route(
            "/:assessment_id/questions/:question_id",
            put(assessment::update_question).delete(assessment::delete_question),
        )
        .route(
            "/:assessment_id/attempts",
            get(assessment::my_attempts).post(assessment::start_attempt),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
}

/// Certificate routes (protected)
fn certificate_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/", post(certificate::issue_certificate))
        .route("/me", get(certificate::my_certificates))
        .route("/expiring", get(certificate::expiring_certificates))
        .route("/statistics", get(certificate::certificate_statistics))
        .route(
            "/templates",
            get(certificate::list_templates).post(certificate::create_template),
        )
        .route(
            "/eligibility/:enrollment_id",
            get(certificate::check_eligibility),
        )
        .route("/:certificate_id", get(certificate::get_certificate))
        .route("/:certificate_id/render", get(certificate::render_certificate))
        .route("/:certificate_id/share", get(certificate::share_link))
        .route("/:certificate_id/revoke", post(certificate::revoke_certificate))
        .route("/:certificate_id/reissue", post(certificate::reissue_certificate))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
}

/// Learning path routes (protected)
fn learning_path_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(learning_path::list_paths).post(learning_path::create_path))
        .route("/me", get(learning_path::my_paths))
        .route("/expiring", get(learning_path::expiring_assignments))
        .route(
            "/:path_id",
            get(learning_path::get_path).put(learning_path::update_path),
        )
        .route("/:path_id/status", put(learning_path::set_path_status))
        .route("/:path_id/courses", post(learning_path::add_path_course))
        .route(
            "/:path_id/courses/:course_id",
            delete(learning_path::remove_path_course),
        )
        .route("/:path_id/assign", post(learning_path::assign_path))
        .route("/:path_id/progress", get(learning_path::my_path_detail))
        .route("/:path_id/users/:user_id", get(learning_path::user_path_detail))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
}

/// Offline sync routes (protected)
fn sync_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/", post(sync::start_sync))
        .route("/status", get(sync::sync_status))
        .route("/conflicts", get(sync::list_conflicts))
        .route("/conflicts/:conflict_id/resolve", post(sync::resolve_conflict))
        .route("/:log_id/upload", post(sync::upload))
        .route("/:log_id/download", get(sync::download))
        .route("/:log_id/complete", post(sync::complete_sync))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
}

/// Notification routes (protected)
fn notification_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(notification::list_notifications).post(notification::send_notification),
        )
        .route("/unread-count", get(notification::unread_count))
        .route("/read-all", post(notification::mark_all_read))
        .route("/:notification_id/read", post(notification::mark_read))
        .route(
            "/preferences",
            get(notification::get_preferences).put(notification::update_preferences),
        )
        .route(
            "/push",
            post(notification::register_push).delete(notification::remove_push),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
}

/// Gamification routes (protected)
fn gamification_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/me", get(gamification::my_stats))
        .route("/history", get(gamification::points_history))
        .route("/leaderboard", get(gamification::leaderboard))
        .route("/badges", get(gamification::list_badges))
        .route("/award", post(gamification::award_points))
        .route("/deduct", post(gamification::deduct_points))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
}

/// Reporting routes (protected)
fn report_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(reporting::get_dashboard))
        .route("/compliance", get(reporting::get_compliance_report))
        .route("/certificates", get(reporting::get_certificate_report))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
}
