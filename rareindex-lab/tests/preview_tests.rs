//! Document preview generation and upload tests

mod helpers;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use helpers::{seed_chain, test_pool, test_state};
use http_body_util::BodyExt;
use rareindex_lab::build_router;
use rareindex_lab::db::documents::{self, DocumentTable, NewReport};
use rareindex_lab::services::preview::PreviewService;
use std::fs;
use std::sync::Arc;
use tower::util::ServiceExt;

const BOUNDARY: &str = "rareindexboundary";

/// Multipart `/reports` request: pipeline, optional variant, one file
fn report_upload(pipeline_id: i64, variant: Option<&str>, file_name: &str, contents: &[u8]) -> Request<Body> {
    let mut body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"pipeline\"\r\n\r\n{pipeline_id}\r\n",
        b = BOUNDARY
    )
    .into_bytes();
    if let Some(variant) = variant {
        body.extend_from_slice(
            format!("--{b}\r\nContent-Disposition: form-data; name=\"variant\"\r\n\r\n{variant}\r\n", b = BOUNDARY)
                .as_bytes(),
        );
    }
    body.extend_from_slice(
        format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\n\
             Content-Type: application/octet-stream\r\n\r\n",
            b = BOUNDARY
        )
        .as_bytes(),
    );
    body.extend_from_slice(contents);
    body.extend_from_slice(format!("\r\n--{b}--\r\n", b = BOUNDARY).as_bytes());

    Request::builder()
        .method("POST")
        .uri("/reports")
        .header("content-type", format!("multipart/form-data; boundary={}", BOUNDARY))
        .body(Body::from(body))
        .unwrap()
}

fn stored_reports(media: &std::path::Path) -> Vec<String> {
    match fs::read_dir(media.join("reports")) {
        Ok(entries) => entries
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect(),
        Err(_) => Vec::new(),
    }
}

fn preview_files(media: &std::path::Path) -> Vec<String> {
    match fs::read_dir(media.join("previews")) {
        Ok(entries) => entries
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect(),
        Err(_) => Vec::new(),
    }
}

#[tokio::test]
async fn test_docx_report_gets_single_preview() {
    let pool = test_pool().await;
    let chain = seed_chain(&pool, "FAM_DOC").await;
    let media = tempfile::tempdir().unwrap();
    fs::create_dir_all(media.path().join("reports")).unwrap();
    fs::write(media.path().join("reports/wes_report.docx"), b"PK\x03\x04 not a real docx").unwrap();

    let report_id = {
        let mut conn = pool.acquire().await.unwrap();
        documents::create_report(
            &mut conn,
            &NewReport {
                pipeline_id: chain.pipeline_id,
                analysis_id: Some(chain.analysis_id),
                file_path: Some("reports/wes_report.docx".to_string()),
                ..NewReport::default()
            },
        )
        .await
        .unwrap()
    };

    let converter = Arc::new(helpers::FakeConverter::default());
    let service = PreviewService::new(pool.clone(), media.path().to_path_buf(), converter.clone());

    let first = service.try_generate(DocumentTable::AnalysisReport, report_id).await.unwrap();
    assert_eq!(first.as_deref(), Some("previews/wes_report_preview.pdf"));
    let pdf = fs::read(media.path().join("previews/wes_report_preview.pdf")).unwrap();
    assert!(pdf.starts_with(b"%PDF"));

    // Already has a preview
    let second = service.try_generate(DocumentTable::AnalysisReport, report_id).await.unwrap();
    assert_eq!(second, None);
    assert_eq!(converter.calls(), 1);
    assert_eq!(preview_files(media.path()).len(), 1);

    let paths = documents::document_paths(&pool, DocumentTable::AnalysisReport, report_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(paths.preview_path.as_deref(), Some("previews/wes_report_preview.pdf"));
}

#[tokio::test]
async fn test_non_docx_and_missing_rows() {
    let pool = test_pool().await;
    let chain = seed_chain(&pool, "FAM_PDF").await;
    let media = tempfile::tempdir().unwrap();

    let form_id = {
        let mut conn = pool.acquire().await.unwrap();
        documents::create_request_form(&mut conn, chain.individual_id, None, Some("request_forms/scan.pdf"), None)
            .await
            .unwrap()
    };

    let converter = Arc::new(helpers::FakeConverter::default());
    let service = PreviewService::new(pool.clone(), media.path().to_path_buf(), converter.clone());

    assert_eq!(service.try_generate(DocumentTable::RequestForm, form_id).await.unwrap(), None);
    assert!(service.try_generate(DocumentTable::RequestForm, 999).await.is_err());
    assert_eq!(service.generate(DocumentTable::RequestForm, 999).await, None);
    assert_eq!(converter.calls(), 0);
}

#[tokio::test]
async fn test_generate_missing_covers_both_tables() {
    let pool = test_pool().await;
    let chain = seed_chain(&pool, "FAM_BULK").await;
    let media = tempfile::tempdir().unwrap();
    fs::create_dir_all(media.path().join("reports")).unwrap();
    fs::create_dir_all(media.path().join("request_forms")).unwrap();
    fs::write(media.path().join("reports/summary.docx"), b"docx").unwrap();
    fs::write(media.path().join("request_forms/summary.docx"), b"docx").unwrap();

    {
        let mut conn = pool.acquire().await.unwrap();
        documents::create_report(
            &mut conn,
            &NewReport {
                pipeline_id: chain.pipeline_id,
                file_path: Some("reports/summary.docx".to_string()),
                ..NewReport::default()
            },
        )
        .await
        .unwrap();
        documents::create_request_form(&mut conn, chain.individual_id, None, Some("request_forms/summary.docx"), None)
            .await
            .unwrap();
    }

    let converter = Arc::new(helpers::FakeConverter::default());
    let service = PreviewService::new(pool.clone(), media.path().to_path_buf(), converter);
    let summary = service.generate_missing().await.unwrap();
    assert_eq!(summary.generated, 2);
    assert_eq!(summary.failed, 0);

    // Same stem twice: the second preview carries the row id
    let mut files = preview_files(media.path());
    files.sort();
    assert_eq!(files.len(), 2);
    assert!(files.contains(&"summary_preview.pdf".to_string()));

    assert_eq!(service.generate_missing().await.unwrap().generated, 0);
}

#[tokio::test]
async fn test_report_upload_stores_file_and_preview() {
    let pool = test_pool().await;
    let chain = seed_chain(&pool, "FAM_UP").await;
    let media = tempfile::tempdir().unwrap();
    let (state, converter) = test_state(pool.clone(), media.path(), chain.user_id);
    let router = build_router(state);

    let boundary = "rareindexboundary";
    let body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"pipeline\"\r\n\r\n{pipeline}\r\n\
         --{b}\r\nContent-Disposition: form-data; name=\"description\"\r\n\r\nWES final report\r\n\
         --{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"Final Report.docx\"\r\n\
         Content-Type: application/vnd.openxmlformats-officedocument.wordprocessingml.document\r\n\r\n\
         docx-bytes\r\n--{b}--\r\n",
        b = boundary,
        pipeline = chain.pipeline_id,
    );
    let request = Request::builder()
        .method("POST")
        .uri("/reports")
        .header("content-type", format!("multipart/form-data; boundary={}", boundary))
        .body(Body::from(body))
        .unwrap();

    let response = router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json["file_path"], "reports/Final_Report.docx");
    assert_eq!(json["preview_path"], "previews/Final_Report_preview.pdf");
    assert_eq!(fs::read(media.path().join("reports/Final_Report.docx")).unwrap(), b"docx-bytes");
    assert_eq!(converter.calls(), 1);

    // Missing pipeline
    let body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"x.pdf\"\r\n\r\nx\r\n--{b}--\r\n",
        b = boundary
    );
    let request = Request::builder()
        .method("POST")
        .uri("/reports")
        .header("content-type", format!("multipart/form-data; boundary={}", boundary))
        .body(Body::from(body))
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_large_report_upload_is_accepted() {
    let pool = test_pool().await;
    let chain = seed_chain(&pool, "FAM_BIG").await;
    let media = tempfile::tempdir().unwrap();
    let (state, converter) = test_state(pool.clone(), media.path(), chain.user_id);
    let router = build_router(state);

    let contents = vec![b'%'; 3 * 1024 * 1024];
    let response = router
        .oneshot(report_upload(chain.pipeline_id, None, "exome_scan.pdf", &contents))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let stored = fs::read(media.path().join("reports/exome_scan.pdf")).unwrap();
    assert_eq!(stored.len(), contents.len());
    assert_eq!(converter.calls(), 0);
}

#[tokio::test]
async fn test_upload_over_configured_limit_is_refused() {
    let pool = test_pool().await;
    let chain = seed_chain(&pool, "FAM_LIMIT").await;
    let media = tempfile::tempdir().unwrap();
    let (state, _converter) = test_state(pool.clone(), media.path(), chain.user_id);
    let router = build_router(state.with_upload_limit(1024 * 1024));

    let contents = vec![0u8; 2 * 1024 * 1024];
    let response = router
        .oneshot(report_upload(chain.pipeline_id, None, "too_big.pdf", &contents))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert!(stored_reports(media.path()).is_empty());
}

#[tokio::test]
async fn test_unknown_variant_rejects_upload_before_storing() {
    let pool = test_pool().await;
    let chain = seed_chain(&pool, "FAM_VAR").await;
    let media = tempfile::tempdir().unwrap();
    let (state, _converter) = test_state(pool.clone(), media.path(), chain.user_id);
    let router = build_router(state);

    let response = router
        .oneshot(report_upload(chain.pipeline_id, Some("987654"), "report.pdf", b"%PDF-1.4"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert!(json["errors"]["variant"][0].as_str().unwrap().contains("987654"));
    assert!(stored_reports(media.path()).is_empty());
}

#[tokio::test]
async fn test_failed_save_removes_uploaded_file() {
    let pool = test_pool().await;
    let chain = seed_chain(&pool, "FAM_FAIL").await;
    let media = tempfile::tempdir().unwrap();
    sqlx::query(
        "CREATE TRIGGER reject_reports BEFORE INSERT ON analysis_reports \
         BEGIN SELECT RAISE(ABORT, 'storage unavailable'); END",
    )
    .execute(&pool)
    .await
    .unwrap();
    let (state, converter) = test_state(pool.clone(), media.path(), chain.user_id);
    let router = build_router(state);

    let response = router
        .oneshot(report_upload(chain.pipeline_id, None, "lost.docx", b"docx-bytes"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(stored_reports(media.path()).is_empty());
    assert_eq!(converter.calls(), 0);
    let reports: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM analysis_reports")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(reports, 0);
}
