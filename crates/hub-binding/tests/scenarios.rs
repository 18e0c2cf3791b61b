//! Resource round trips against the in-process hub.

mod common;

use hub_binding::api;
use hub_binding::{ErrorKind, Params, Path, ensure};

use common::{Application, serve};

fn application_path(id: u64) -> String {
    Path::new(api::APPLICATION_ROUTE).inject(&Params::new().with(api::ID, id))
}

#[tokio::test(flavor = "multi_thread")]
async fn test_get_not_found() {
    let (base, _hub) = serve().await;
    let client = common::client(&base);
    let mut app = Application {
        id: 1,
        name: "untouched".into(),
    };
    let err = client.get(&application_path(42), &mut app, &[]).await.unwrap_err();
    assert!(ErrorKind::NotFound.is(&err));
    assert_eq!(app.name, "untouched");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_create_then_fetch() {
    let (base, hub) = serve().await;
    let client = common::client(&base);
    let mut created = Application {
        id: 0,
        name: "X".into(),
    };
    client
        .post(api::APPLICATIONS_ROUTE, &mut created)
        .await
        .unwrap();
    assert_eq!(created.id, 7);

    let mut fetched = Application::default();
    client
        .get(&application_path(created.id), &mut fetched, &[])
        .await
        .unwrap();
    assert_eq!(fetched.name, "X");

    let auth = hub.authorization.lock().unwrap().clone();
    assert_eq!(auth, ["Bearer test", "Bearer test"]);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_conflict_on_duplicate() {
    let (base, _hub) = serve().await;
    let client = common::client(&base);
    let mut first = Application {
        id: 0,
        name: "dup".into(),
    };
    client.post(api::APPLICATIONS_ROUTE, &mut first).await.unwrap();

    let mut second = first.clone();
    let result = client.post(api::APPLICATIONS_ROUTE, &mut second).await;
    let err = result.as_ref().unwrap_err();
    assert!(err.is_conflict());
    assert!(err.to_string().contains("exists"));
    ensure(result).unwrap();
}
