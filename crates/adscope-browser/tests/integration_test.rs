use adscope_browser::{
    as_height, scripts, BrowserError, BrowserSession, ChromiumLauncher, Key, SessionLauncher,
};
use adscope_core::{BrowserConfig, Locator, RenderMode};
use std::time::Duration;

fn launcher() -> ChromiumLauncher {
    ChromiumLauncher::new(BrowserConfig::default())
}

#[tokio::test]
#[ignore] // Requires Chrome/Chromium installed
async fn test_session_launch() {
    let session = launcher().launch(RenderMode::Headless).await;
    assert!(session.is_ok(), "Failed to launch browser session");
    let session = session.unwrap();
    session.close().await.unwrap();

    assert!(matches!(
        session.navigate("https://example.com").await,
        Err(BrowserError::SessionClosed)
    ));
    // Closing twice is a no-op
    session.close().await.unwrap();
}

#[tokio::test]
#[ignore] // Requires Chrome/Chromium installed
async fn test_navigation_and_lookup() {
    let session = launcher().launch(RenderMode::Headless).await.unwrap();

    session.navigate("https://example.com").await.unwrap();

    let heading = session
        .locate_first(None, &Locator::xpath("//h1"))
        .await
        .unwrap()
        .expect("example.com has a heading");
    assert_eq!(session.text(&heading).await.unwrap(), "Example Domain");

    let links = session.locate(None, &Locator::css("a")).await.unwrap();
    assert!(!links.is_empty());
    let href = session.attribute(&links[0], "href").await.unwrap();
    assert!(href.is_some());

    session.close().await.unwrap();
}

#[tokio::test]
#[ignore] // Requires Chrome/Chromium installed
async fn test_scripts_and_keys() {
    let session = launcher().launch(RenderMode::Headless).await.unwrap();
    session.navigate("https://example.com").await.unwrap();

    session
        .execute(scripts::SCROLL_PAGE_TO_BOTTOM, None)
        .await
        .unwrap();
    let height = session
        .execute(scripts::PAGE_SCROLL_HEIGHT, None)
        .await
        .unwrap();
    assert!(as_height(&height).unwrap() > 0);

    assert!(!session
        .wait_until(&Locator::css("div.does-not-exist"), Duration::from_millis(300))
        .await
        .unwrap());
    session.send_key(Key::Escape).await.unwrap();

    session.close().await.unwrap();
}
