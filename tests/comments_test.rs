mod common;

use axum::http::StatusCode;
use common::{create_ressource, register_user, send_json, setup_app};
use serde_json::json;

async fn post_comment(
    app: &axum::Router,
    token: &str,
    ressource_id: &str,
    contenu: &str,
    parent_id: Option<&str>,
) -> (StatusCode, serde_json::Value) {
    let mut payload = json!({ "contenu": contenu });
    if let Some(parent) = parent_id {
        payload["parent_id"] = json!(parent);
    }
    send_json(
        app,
        "POST",
        &format!("/api/ressources/{}/commentaires", ressource_id),
        Some(token),
        Some(payload),
    )
    .await
}

#[tokio::test]
async fn comment_and_reply_thread() {
    let (app, db) = setup_app().await;
    let (_, prof_token) = register_user(&app, &db, "prof@diagana.sn", "professeur").await;
    let (_, eleve_token) = register_user(&app, &db, "eleve@diagana.sn", "eleve").await;

    let rid = create_ressource(&app, &prof_token, "Ressource commentée", true).await;

    let (status, body) = post_comment(&app, &eleve_token, &rid, "Très clair, merci !", None).await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    let parent_id = body["commentaire"]["id"].as_str().unwrap().to_string();

    let (status, _) = post_comment(&app, &prof_token, &rid, "Avec plaisir.", Some(&parent_id)).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send_json(
        &app,
        "GET",
        &format!("/api/ressources/{}/commentaires", rid),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let threads = body["commentaires"].as_array().unwrap();
    assert_eq!(threads.len(), 1);
    assert_eq!(threads[0]["contenu"], json!("Très clair, merci !"));
    assert_eq!(threads[0]["author"]["prenom"], json!("Test"));
    let replies = threads[0]["replies"].as_array().unwrap();
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0]["contenu"], json!("Avec plaisir."));
    assert_eq!(replies[0]["parent_id"], json!(parent_id));
}

#[tokio::test]
async fn reply_to_reply_is_rejected() {
    let (app, db) = setup_app().await;
    let (_, token) = register_user(&app, &db, "fil@diagana.sn", "professeur").await;
    let rid = create_ressource(&app, &token, "Fil de discussion", true).await;

    let (_, body) = post_comment(&app, &token, &rid, "Niveau 1", None).await;
    let top = body["commentaire"]["id"].as_str().unwrap().to_string();

    let (_, body) = post_comment(&app, &token, &rid, "Niveau 2", Some(&top)).await;
    let reply = body["commentaire"]["id"].as_str().unwrap().to_string();

    let (status, body) = post_comment(&app, &token, &rid, "Niveau 3", Some(&reply)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], json!("Commentaire parent invalide"));
}

#[tokio::test]
async fn parent_must_belong_to_same_ressource() {
    let (app, db) = setup_app().await;
    let (_, token) = register_user(&app, &db, "croise@diagana.sn", "professeur").await;

    let r1 = create_ressource(&app, &token, "Ressource A", true).await;
    let r2 = create_ressource(&app, &token, "Ressource B", true).await;

    let (_, body) = post_comment(&app, &token, &r1, "Sur A", None).await;
    let parent_on_r1 = body["commentaire"]["id"].as_str().unwrap().to_string();

    let (status, _) = post_comment(&app, &token, &r2, "Réponse croisée", Some(&parent_on_r1)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn commenting_needs_a_visible_ressource() {
    let (app, db) = setup_app().await;
    let (_, author_token) = register_user(&app, &db, "a@diagana.sn", "professeur").await;
    let (_, other_token) = register_user(&app, &db, "b@diagana.sn", "eleve").await;

    let hidden = create_ressource(&app, &author_token, "Privé", false).await;

    let (status, _) = post_comment(&app, &other_token, &hidden, "Je te vois", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Anonymous writes are turned away before visibility even matters
    let (status, _) = send_json(
        &app,
        "POST",
        &format!("/api/ressources/{}/commentaires", hidden),
        None,
        Some(json!({ "contenu": "Sans compte" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn contenu_length_is_bounded() {
    let (app, db) = setup_app().await;
    let (_, token) = register_user(&app, &db, "long@diagana.sn", "eleve").await;
    let rid = create_ressource(&app, &token, "Bornes", true).await;

    let (status, _) = post_comment(&app, &token, &rid, "", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let too_long = "x".repeat(1001);
    let (status, _) = post_comment(&app, &token, &rid, &too_long, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let max = "x".repeat(1000);
    let (status, _) = post_comment(&app, &token, &rid, &max, None).await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn edit_marks_comment_edited() {
    let (app, db) = setup_app().await;
    let (_, token) = register_user(&app, &db, "edit@diagana.sn", "eleve").await;
    let (_, other_token) = register_user(&app, &db, "pirate@diagana.sn", "eleve").await;
    let rid = create_ressource(&app, &token, "Éditable", true).await;

    let (_, body) = post_comment(&app, &token, &rid, "Premier jet", None).await;
    let cid = body["commentaire"]["id"].as_str().unwrap().to_string();
    assert_eq!(body["commentaire"]["is_edited"], json!(false));

    // Only the author may edit
    let (status, _) = send_json(
        &app,
        "PUT",
        &format!("/api/commentaires/{}", cid),
        Some(&other_token),
        Some(json!({ "contenu": "Vandalisme" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send_json(
        &app,
        "PUT",
        &format!("/api/commentaires/{}", cid),
        Some(&token),
        Some(json!({ "contenu": "Version corrigée" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["commentaire"]["contenu"], json!("Version corrigée"));
    assert_eq!(body["commentaire"]["is_edited"], json!(true));
}

#[tokio::test]
async fn deleting_comment_removes_replies() {
    let (app, db) = setup_app().await;
    let (_, token) = register_user(&app, &db, "cascade@diagana.sn", "professeur").await;
    let rid = create_ressource(&app, &token, "Cascade", true).await;

    let (_, body) = post_comment(&app, &token, &rid, "Racine", None).await;
    let root = body["commentaire"]["id"].as_str().unwrap().to_string();
    post_comment(&app, &token, &rid, "Réponse 1", Some(&root)).await;
    post_comment(&app, &token, &rid, "Réponse 2", Some(&root)).await;

    let (status, _) = send_json(
        &app,
        "DELETE",
        &format!("/api/commentaires/{}", root),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send_json(
        &app,
        "GET",
        &format!("/api/ressources/{}/commentaires", rid),
        None,
        None,
    )
    .await;
    assert_eq!(body["commentaires"].as_array().unwrap().len(), 0);
}
