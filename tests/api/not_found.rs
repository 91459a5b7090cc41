use crate::helpers::TestApp;

#[tokio::test]
async fn unknown_page_renders_a_not_found_page() {
    // given
    let app = TestApp::spawn().await;

    // when
    let response = app.get_unknown_page().await;

    // then
    assert_eq!(response.status(), 404);
    let body = response.text().await.unwrap();
    assert!(body.contains("Page not found"));
    assert!(body.contains(r#"<a href="/">Return to Home</a>"#));
}
