mod common;

use axum::http::StatusCode;
use common::{
    create_ressource, multipart_body, register_user, send_json, send_multipart, setup_app,
};
use serde_json::json;

#[tokio::test]
async fn upload_document_with_file() {
    let (app, db) = setup_app().await;
    let (user_id, token) = register_user(&app, &db, "prof@diagana.sn", "professeur").await;

    let body = multipart_body(
        &[
            ("titre", "Cours de géométrie"),
            ("description", "Figures planes, chapitre 3"),
            ("type", "document"),
            ("tags", r#"["geometrie", "3eme"]"#),
            ("matiere", "Mathématiques"),
            ("niveau", "3ème"),
            ("is_public", "true"),
        ],
        Some(("cours.pdf", "application/pdf", b"%PDF-1.4 fake content")),
    );

    let (status, json) = send_multipart(&app, "POST", "/api/ressources", &token, body).await;
    assert_eq!(status, StatusCode::CREATED, "{}", json);

    let data = &json["data"];
    assert_eq!(data["titre"], "Cours de géométrie");
    assert_eq!(data["type"], "document");
    assert_eq!(data["author_id"], json!(user_id));
    assert_eq!(data["tags"], json!(["geometrie", "3eme"]));
    // Stored file leaves a capability URL and the original name behind
    let contenu = &data["contenu"];
    assert!(contenu["file_url"].as_str().unwrap().starts_with("https://storage.test/"));
    assert_eq!(contenu["file_name"], "cours.pdf");
    assert!(contenu["file_key"].as_str().unwrap().starts_with(&format!("ressources/{}/", user_id)));
}

#[tokio::test]
async fn upload_rejects_disallowed_extension() {
    let (app, db) = setup_app().await;
    let (_, token) = register_user(&app, &db, "prof2@diagana.sn", "professeur").await;

    let body = multipart_body(
        &[("titre", "Script"), ("type", "document")],
        Some(("malware.exe", "application/octet-stream", b"MZ...")),
    );

    let (status, json) = send_multipart(&app, "POST", "/api/ressources", &token, body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["success"], json!(false));
}

#[tokio::test]
async fn lien_requires_url_in_contenu() {
    let (app, db) = setup_app().await;
    let (_, token) = register_user(&app, &db, "prof3@diagana.sn", "professeur").await;

    let body = multipart_body(&[("titre", "Lien cassé"), ("type", "lien")], None);
    let (status, _) = send_multipart(&app, "POST", "/api/ressources", &token, body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let body = multipart_body(
        &[
            ("titre", "Khan Academy"),
            ("type", "lien"),
            ("contenu", r#"{"url": "https://fr.khanacademy.org"}"#),
        ],
        None,
    );
    let (status, _) = send_multipart(&app, "POST", "/api/ressources", &token, body).await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn private_ressource_hidden_from_others() {
    let (app, db) = setup_app().await;
    let (_, author_token) = register_user(&app, &db, "auteur@diagana.sn", "professeur").await;
    let (_, other_token) = register_user(&app, &db, "autre@diagana.sn", "eleve").await;

    let id = create_ressource(&app, &author_token, "Brouillon privé", false).await;

    // Author sees it
    let uri = format!("/api/ressources/{}", id);
    let (status, _) = send_json(&app, "GET", &uri, Some(&author_token), None).await;
    assert_eq!(status, StatusCode::OK);

    // Everyone else gets a 404, never a 403
    let (status, _) = send_json(&app, "GET", &uri, Some(&other_token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send_json(&app, "GET", &uri, None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // And it stays out of the anonymous listing
    let (status, body) = send_json(&app, "GET", "/api/ressources", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ressources"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn update_is_author_only() {
    let (app, db) = setup_app().await;
    let (_, author_token) = register_user(&app, &db, "proprio@diagana.sn", "professeur").await;
    let (_, other_token) = register_user(&app, &db, "intrus@diagana.sn", "professeur").await;

    let id = create_ressource(&app, &author_token, "Ressource publique", true).await;
    let uri = format!("/api/ressources/{}", id);

    let body = multipart_body(&[("titre", "Titre piraté")], None);
    let (status, _) = send_multipart(&app, "PUT", &uri, &other_token, body).await;
    // Visible but not owned
    assert_eq!(status, StatusCode::FORBIDDEN);

    let body = multipart_body(&[("titre", "Titre corrigé")], None);
    let (status, json) = send_multipart(&app, "PUT", &uri, &author_token, body).await;
    assert_eq!(status, StatusCode::OK, "{}", json);
    assert_eq!(json["data"]["titre"], "Titre corrigé");
}

#[tokio::test]
async fn like_toggles_and_counts() {
    let (app, db) = setup_app().await;
    let (_, author_token) = register_user(&app, &db, "a@diagana.sn", "professeur").await;
    let (_, fan_token) = register_user(&app, &db, "fan@diagana.sn", "eleve").await;

    let id = create_ressource(&app, &author_token, "Ressource aimée", true).await;
    let like_uri = format!("/api/ressources/{}/like", id);

    let (status, body) = send_json(&app, "POST", &like_uri, Some(&fan_token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["liked"], json!(true));

    let (_, body) = send_json(
        &app,
        "GET",
        &format!("/api/ressources/{}", id),
        Some(&fan_token),
        None,
    )
    .await;
    assert_eq!(body["ressource"]["likes_count"], json!(1));
    assert_eq!(body["ressource"]["is_liked"], json!(true));

    // Second toggle removes the like
    let (status, body) = send_json(&app, "POST", &like_uri, Some(&fan_token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["liked"], json!(false));

    let (_, body) = send_json(
        &app,
        "GET",
        &format!("/api/ressources/{}", id),
        Some(&fan_token),
        None,
    )
    .await;
    assert_eq!(body["ressource"]["likes_count"], json!(0));
    assert_eq!(body["ressource"]["is_liked"], json!(false));
}

#[tokio::test]
async fn anonymous_view_increments_counter() {
    let (app, db) = setup_app().await;
    let (_, token) = register_user(&app, &db, "vu@diagana.sn", "professeur").await;
    let id = create_ressource(&app, &token, "Ressource vue", true).await;

    let (status, _) = send_json(
        &app,
        "POST",
        &format!("/api/ressources/{}/view", id),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send_json(&app, "GET", &format!("/api/ressources/{}", id), None, None).await;
    assert_eq!(body["ressource"]["views_count"], json!(1));
}

#[tokio::test]
async fn download_redirects_and_counts() {
    let (app, db) = setup_app().await;
    let (_, token) = register_user(&app, &db, "dl@diagana.sn", "professeur").await;

    let body = multipart_body(
        &[("titre", "Fiche à télécharger"), ("type", "document"), ("is_public", "true")],
        Some(("fiche.pdf", "application/pdf", b"%PDF-1.4")),
    );
    let (status, json) = send_multipart(&app, "POST", "/api/ressources", &token, body).await;
    assert_eq!(status, StatusCode::CREATED, "{}", json);
    let id = json["data"]["id"].as_str().unwrap().to_string();

    let (status, body) = send_json(
        &app,
        "GET",
        &format!("/api/ressources/{}/download", id),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FOUND);
    assert!(body["url"].as_str().unwrap().starts_with("https://storage.test/"));

    let (_, body) = send_json(&app, "GET", &format!("/api/ressources/{}", id), None, None).await;
    assert_eq!(body["ressource"]["downloads_count"], json!(1));
}

#[tokio::test]
async fn download_lien_without_file_is_rejected() {
    let (app, db) = setup_app().await;
    let (_, token) = register_user(&app, &db, "lien@diagana.sn", "professeur").await;
    let id = create_ressource(&app, &token, "Simple lien", true).await;

    let (status, _) = send_json(
        &app,
        "GET",
        &format!("/api/ressources/{}/download", id),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn list_filters_by_tag_and_type() {
    let (app, db) = setup_app().await;
    let (_, token) = register_user(&app, &db, "filtre@diagana.sn", "professeur").await;

    for (titre, tags) in [
        ("Algèbre", r#"["maths", "algebre"]"#),
        ("Géométrie", r#"["maths", "geometrie"]"#),
        ("Dictée", r#"["francais"]"#),
    ] {
        let body = multipart_body(
            &[
                ("titre", titre),
                ("type", "lien"),
                ("contenu", r#"{"url": "https://exemple.fr"}"#),
                ("tags", tags),
                ("is_public", "true"),
            ],
            None,
        );
        let (status, _) = send_multipart(&app, "POST", "/api/ressources", &token, body).await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, body) = send_json(&app, "GET", "/api/ressources?tags=maths", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ressources"].as_array().unwrap().len(), 2);

    // Overlap: any requested tag matches
    let (_, body) = send_json(&app, "GET", "/api/ressources?tags=francais,algebre", None, None).await;
    assert_eq!(body["ressources"].as_array().unwrap().len(), 2);

    let (_, body) = send_json(&app, "GET", "/api/ressources?search=géo", None, None).await;
    assert_eq!(body["ressources"].as_array().unwrap().len(), 1);
    assert_eq!(body["ressources"][0]["titre"], "Géométrie");
}

#[tokio::test]
async fn pagination_is_clamped() {
    let (app, db) = setup_app().await;
    let (_, token) = register_user(&app, &db, "pages@diagana.sn", "professeur").await;

    for i in 0..3 {
        create_ressource(&app, &token, &format!("Ressource {}", i), true).await;
    }

    let (status, body) = send_json(
        &app,
        "GET",
        "/api/ressources?page=0&limit=999",
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pagination"]["page"], json!(1));
    assert_eq!(body["pagination"]["limit"], json!(50));
    assert_eq!(body["pagination"]["total"], json!(3));
    assert_eq!(body["pagination"]["pages"], json!(1));

    let (_, body) = send_json(&app, "GET", "/api/ressources?limit=2", None, None).await;
    assert_eq!(body["ressources"].as_array().unwrap().len(), 2);
    assert_eq!(body["pagination"]["pages"], json!(2));
}

#[tokio::test]
async fn delete_removes_ressource() {
    let (app, db) = setup_app().await;
    let (_, token) = register_user(&app, &db, "suppr@diagana.sn", "professeur").await;
    let id = create_ressource(&app, &token, "À supprimer", true).await;

    let uri = format!("/api/ressources/{}", id);
    let (status, _) = send_json(&app, "DELETE", &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send_json(&app, "GET", &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
