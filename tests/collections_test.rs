mod common;

use axum::http::StatusCode;
use common::{create_ressource, register_user, send_json, setup_app};
use serde_json::json;

async fn create_collection(
    app: &axum::Router,
    token: &str,
    nom: &str,
    is_public: bool,
) -> String {
    let (status, body) = send_json(
        app,
        "POST",
        "/api/collections",
        Some(token),
        Some(json!({ "nom": nom, "is_public": is_public })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    body["collection"]["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn add_ressource_keeps_insertion_order() {
    let (app, db) = setup_app().await;
    let (_, token) = register_user(&app, &db, "ordre@diagana.sn", "professeur").await;

    let collection_id = create_collection(&app, &token, "Séquence algèbre", true).await;
    let r1 = create_ressource(&app, &token, "Chapitre 1", true).await;
    let r2 = create_ressource(&app, &token, "Chapitre 2", true).await;

    for rid in [&r1, &r2] {
        let (status, _) = send_json(
            &app,
            "POST",
            &format!("/api/collections/{}/ressources", collection_id),
            Some(&token),
            Some(json!({ "ressource_id": rid })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, body) = send_json(
        &app,
        "GET",
        &format!("/api/collections/{}", collection_id),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let membres = body["collection"]["ressources"].as_array().unwrap();
    assert_eq!(membres.len(), 2);
    assert_eq!(membres[0]["id"], json!(r1));
    assert_eq!(membres[0]["ordre"], json!(0));
    assert_eq!(membres[1]["id"], json!(r2));
    assert_eq!(membres[1]["ordre"], json!(1));
}

#[tokio::test]
async fn duplicate_membership_is_a_conflict() {
    let (app, db) = setup_app().await;
    let (_, token) = register_user(&app, &db, "doublon@diagana.sn", "professeur").await;

    let collection_id = create_collection(&app, &token, "Ma collection", true).await;
    let rid = create_ressource(&app, &token, "Unique", true).await;

    let uri = format!("/api/collections/{}/ressources", collection_id);
    let payload = json!({ "ressource_id": rid });

    let (status, _) = send_json(&app, "POST", &uri, Some(&token), Some(payload.clone())).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send_json(&app, "POST", &uri, Some(&token), Some(payload)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], json!("Cette ressource est déjà dans la collection"));
}

#[tokio::test]
async fn cannot_add_invisible_ressource() {
    let (app, db) = setup_app().await;
    let (_, owner_token) = register_user(&app, &db, "proprietaire@diagana.sn", "professeur").await;
    let (_, other_token) = register_user(&app, &db, "tiers@diagana.sn", "professeur").await;

    // Someone else's private ressource
    let hidden = create_ressource(&app, &other_token, "Caché", false).await;

    let collection_id = create_collection(&app, &owner_token, "Emprunts", true).await;
    let (status, _) = send_json(
        &app,
        "POST",
        &format!("/api/collections/{}/ressources", collection_id),
        Some(&owner_token),
        Some(json!({ "ressource_id": hidden })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn reorder_updates_positions() {
    let (app, db) = setup_app().await;
    let (_, token) = register_user(&app, &db, "reorg@diagana.sn", "professeur").await;

    let collection_id = create_collection(&app, &token, "À réorganiser", true).await;
    let r1 = create_ressource(&app, &token, "Premier", true).await;
    let r2 = create_ressource(&app, &token, "Second", true).await;

    for rid in [&r1, &r2] {
        send_json(
            &app,
            "POST",
            &format!("/api/collections/{}/ressources", collection_id),
            Some(&token),
            Some(json!({ "ressource_id": rid })),
        )
        .await;
    }

    let (status, _) = send_json(
        &app,
        "PUT",
        &format!("/api/collections/{}/reorder", collection_id),
        Some(&token),
        Some(json!({
            "ressources": [
                { "ressource_id": r1, "ordre": 1 },
                { "ressource_id": r2, "ordre": 0 },
            ]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send_json(
        &app,
        "GET",
        &format!("/api/collections/{}", collection_id),
        Some(&token),
        None,
    )
    .await;
    let membres = body["collection"]["ressources"].as_array().unwrap();
    assert_eq!(membres[0]["id"], json!(r2));
    assert_eq!(membres[1]["id"], json!(r1));
}

#[tokio::test]
async fn duplicate_copy_is_always_private() {
    let (app, db) = setup_app().await;
    let (_, author_token) = register_user(&app, &db, "source@diagana.sn", "professeur").await;
    let (copier_id, copier_token) = register_user(&app, &db, "copieur@diagana.sn", "eleve").await;

    let collection_id = create_collection(&app, &author_token, "Publique", true).await;
    let rid = create_ressource(&app, &author_token, "Partagé", true).await;
    send_json(
        &app,
        "POST",
        &format!("/api/collections/{}/ressources", collection_id),
        Some(&author_token),
        Some(json!({ "ressource_id": rid, "ordre": 7 })),
    )
    .await;

    let (status, body) = send_json(
        &app,
        "POST",
        &format!("/api/collections/{}/dupliquer", collection_id),
        Some(&copier_token),
        Some(json!({ "nom": "Ma copie" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    let copy = &body["collection"];
    assert_eq!(copy["nom"], json!("Ma copie"));
    assert_eq!(copy["is_public"], json!(false));
    assert_eq!(copy["author_id"], json!(copier_id));

    // Members re-indexed from zero in the copy
    let copy_id = copy["id"].as_str().unwrap();
    let (_, body) = send_json(
        &app,
        "GET",
        &format!("/api/collections/{}", copy_id),
        Some(&copier_token),
        None,
    )
    .await;
    let membres = body["collection"]["ressources"].as_array().unwrap();
    assert_eq!(membres.len(), 1);
    assert_eq!(membres[0]["ordre"], json!(0));

    // The copy stays invisible to its original author
    let (status, _) = send_json(
        &app,
        "GET",
        &format!("/api/collections/{}", copy_id),
        Some(&author_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn detail_hides_members_gone_private() {
    let (app, db) = setup_app().await;
    let (_, owner_token) = register_user(&app, &db, "cur@diagana.sn", "professeur").await;
    let (_, viewer_token) = register_user(&app, &db, "lecteur@diagana.sn", "eleve").await;

    let collection_id = create_collection(&app, &owner_token, "Mixte", true).await;
    let public_r = create_ressource(&app, &owner_token, "Visible", true).await;
    let private_r = create_ressource(&app, &owner_token, "Retiré", false).await;

    // The owner can add a private member to a public collection
    for rid in [&public_r, &private_r] {
        let (status, _) = send_json(
            &app,
            "POST",
            &format!("/api/collections/{}/ressources", collection_id),
            Some(&owner_token),
            Some(json!({ "ressource_id": rid })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    // Another viewer only sees the public member
    let (_, body) = send_json(
        &app,
        "GET",
        &format!("/api/collections/{}", collection_id),
        Some(&viewer_token),
        None,
    )
    .await;
    let membres = body["collection"]["ressources"].as_array().unwrap();
    assert_eq!(membres.len(), 1);
    assert_eq!(membres[0]["id"], json!(public_r));

    // The owner still sees both
    let (_, body) = send_json(
        &app,
        "GET",
        &format!("/api/collections/{}", collection_id),
        Some(&owner_token),
        None,
    )
    .await;
    assert_eq!(body["collection"]["ressources"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn remove_ressource_and_missing_member_404() {
    let (app, db) = setup_app().await;
    let (_, token) = register_user(&app, &db, "retrait@diagana.sn", "professeur").await;

    let collection_id = create_collection(&app, &token, "Temporaire", true).await;
    let rid = create_ressource(&app, &token, "Éphémère", true).await;

    send_json(
        &app,
        "POST",
        &format!("/api/collections/{}/ressources", collection_id),
        Some(&token),
        Some(json!({ "ressource_id": rid })),
    )
    .await;

    let uri = format!("/api/collections/{}/ressources/{}", collection_id, rid);
    let (status, _) = send_json(&app, "DELETE", &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);

    // Removing again: the membership row no longer exists
    let (status, _) = send_json(&app, "DELETE", &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn ressource_lists_its_public_collections() {
    let (app, db) = setup_app().await;
    let (_, token) = register_user(&app, &db, "index@diagana.sn", "professeur").await;

    let rid = create_ressource(&app, &token, "Indexée", true).await;
    let public_c = create_collection(&app, &token, "Vitrine", true).await;
    let private_c = create_collection(&app, &token, "Brouillons", false).await;

    for cid in [&public_c, &private_c] {
        send_json(
            &app,
            "POST",
            &format!("/api/collections/{}/ressources", cid),
            Some(&token),
            Some(json!({ "ressource_id": rid })),
        )
        .await;
    }

    let (status, body) = send_json(
        &app,
        "GET",
        &format!("/api/ressources/{}/collections", rid),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let collections = body["collections"].as_array().unwrap();
    assert_eq!(collections.len(), 1);
    assert_eq!(collections[0]["id"], json!(public_c));
    assert_eq!(collections[0]["ressources_count"], json!(1));
}

#[tokio::test]
async fn search_matches_nom_and_description() {
    let (app, db) = setup_app().await;
    let (_, token) = register_user(&app, &db, "recherche@diagana.sn", "professeur").await;

    create_collection(&app, &token, "Geometrie plane", true).await;
    let (status, _) = send_json(
        &app,
        "POST",
        "/api/collections",
        Some(&token),
        Some(json!({
            "nom": "Exercices corriges",
            "description": "Revisions de geometrie pour la 3ème",
            "is_public": true,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    // Matches the nom of the first and the description of the second
    let (status, body) = send_json(&app, "GET", "/api/collections?search=geometrie", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["collections"].as_array().unwrap().len(), 2);

    let (_, body) = send_json(&app, "GET", "/api/collections?search=corriges", None, None).await;
    let found = body["collections"].as_array().unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0]["nom"], json!("Exercices corriges"));
}
