//! Catalog create, duplicate, export and import against a running server.

use partsdesk_integration_tests::{TestClient, id_from_path, redirect_target, unique_suffix};
use reqwest::StatusCode;
use reqwest::multipart::{Form, Part};
use serde_json::json;

async fn create_product(client: &TestClient, sku: &str) -> i32 {
    let resp = client
        .post_json(
            "/products",
            &json!({
                "description": "Oil filter",
                "sku": sku,
                "location_bin": "A-01",
                "list_price": "12.99",
                "buy_price": "4.10",
                "visibility": "public",
                "category": "Filters",
                "fitments": [
                    { "year_from": "2010", "year_to": "2015", "make": "Honda", "model": "Civic" }
                ],
                "part_numbers": ["OF-100", ""],
                "stock": []
            }),
        )
        .await;
    let location = redirect_target(&resp);
    assert!(location.ends_with("/edit"), "unexpected redirect {location}");
    id_from_path(&location)
}

#[tokio::test]
#[ignore = "Requires running admin server and database"]
async fn test_duplicate_sku_is_a_field_error() {
    let client = TestClient::login().await;
    let sku = format!("IT-{}", unique_suffix());
    let id = create_product(&client, &sku).await;

    let resp = client
        .post_json(
            "/products",
            &json!({ "description": "Another", "sku": sku, "list_price": "1.00" }),
        )
        .await;
    assert_eq!(redirect_target(&resp), "/products/create");
    let page = client.page("/products/create").await;
    assert!(page["props"]["errors"]["sku"].is_string());

    client.delete(&format!("/products/{id}")).await;
}

#[tokio::test]
#[ignore = "Requires running admin server and database"]
async fn test_duplicate_product_is_a_draft() {
    let client = TestClient::login().await;
    let sku = format!("IT-{}", unique_suffix());
    let id = create_product(&client, &sku).await;

    let resp = client
        .inner()
        .post(client.url(&format!("/products/{id}/duplicate")))
        .send()
        .await
        .expect("POST failed");
    let copy = id_from_path(&redirect_target(&resp));
    assert_ne!(copy, id);

    let page = client.page(&format!("/products/{copy}/edit")).await;
    assert_eq!(page["props"]["form"]["visibility"], "draft");
    assert_ne!(page["props"]["form"]["sku"], sku.as_str());
    assert_eq!(
        page["props"]["form"]["fitments"].as_array().map(Vec::len),
        Some(1)
    );

    client.delete(&format!("/products/{copy}")).await;
    client.delete(&format!("/products/{id}")).await;
}

#[tokio::test]
#[ignore = "Requires running admin server and database"]
async fn test_export_matching_products() {
    let client = TestClient::login().await;
    let sku = format!("IT-{}", unique_suffix());
    let id = create_product(&client, &sku).await;

    let resp = client.get(&format!("/products/export?search={sku}")).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let disposition = resp
        .headers()
        .get("content-disposition")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(disposition.starts_with("attachment; filename=\"products-"));

    let csv = resp.text().await.expect("body");
    let mut lines = csv.lines();
    assert!(lines.next().is_some_and(|header| header.starts_with("sku,description")));
    assert!(lines.next().is_some_and(|row| row.starts_with(&sku)));
    assert!(lines.next().is_none());

    client.delete(&format!("/products/{id}")).await;
}

#[tokio::test]
#[ignore = "Requires running admin server and database"]
async fn test_import_creates_then_updates() {
    let client = TestClient::login().await;
    let sku = format!("IT-{}", unique_suffix());
    let csv = format!(
        "sku,description,location_bin,list_price,buy_price,visibility,category,\
         subcategory,sub_subcategory,part_numbers,fitments,stock\n\
         {sku},Imported rotor,B-2,89.00,40.00,public,Brakes,,,RT-1|RT-2,2012-2016 Ford Focus,\n"
    );

    for expected in ["1 created", "1 updated"] {
        let form = Form::new().part(
            "file",
            Part::bytes(csv.clone().into_bytes())
                .file_name("catalog.csv")
                .mime_str("text/csv")
                .expect("mime"),
        );
        let resp = client
            .inner()
            .post(client.url("/products/import"))
            .multipart(form)
            .send()
            .await
            .expect("POST failed");
        assert_eq!(redirect_target(&resp), "/products");

        let page = client.page("/products").await;
        let flash = page["props"]["flash"]["success"].as_str().unwrap_or_default();
        assert!(flash.contains(expected), "flash was {flash:?}");
    }

    let list = client.page(&format!("/products?search={sku}")).await;
    let id = list["props"]["products"]["items"][0]["id"]
        .as_i64()
        .expect("imported product listed");
    client.delete(&format!("/products/{id}")).await;
}
