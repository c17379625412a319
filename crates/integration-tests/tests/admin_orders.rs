//! Orders against a running server: lines priced from the catalog, status
//! changes, invoices and the product delete guard.

use partsdesk_integration_tests::{TestClient, id_from_path, redirect_target, unique_suffix};
use reqwest::StatusCode;
use serde_json::json;

async fn create_product(client: &TestClient) -> i32 {
    let resp = client
        .post_json(
            "/products",
            &json!({
                "description": "Spark plug",
                "sku": format!("IT-{}", unique_suffix()),
                "list_price": "10.00",
                "visibility": "public"
            }),
        )
        .await;
    id_from_path(&redirect_target(&resp))
}

#[tokio::test]
#[ignore = "Requires running admin server and database"]
async fn test_order_lifecycle() {
    let client = TestClient::login().await;
    let product = create_product(&client).await;

    let resp = client
        .post_json(
            "/orders",
            &json!({
                "customer_name": "Jordan Driver",
                "customer_phone": "555-0199",
                "order_type": "pickup",
                "status": "processing",
                "items": [
                    // Blank price takes the list price.
                    { "product_id": product, "quantity": "4", "price": "" },
                    {}
                ],
                "payment": { "method": "cash", "amount": "45.20" }
            }),
        )
        .await;
    let location = redirect_target(&resp);
    let id = id_from_path(&location);
    assert_eq!(location, format!("/orders/{id}"));

    let page = client.page(&location).await;
    assert_eq!(page["component"], "Orders/Show");
    let items = page["props"]["order"]["items"].as_array().cloned().unwrap_or_default();
    assert_eq!(items.len(), 1);
    let total = page["props"]["totals"]["total"]
        .as_str()
        .and_then(|s| s.parse::<f64>().ok());
    assert_eq!(total, Some(45.2));

    let resp = client
        .inner()
        .patch(client.url(&format!("/orders/{id}/status")))
        .json(&json!({ "status": "fulfilled" }))
        .send()
        .await
        .expect("PATCH failed");
    assert_eq!(redirect_target(&resp), location);
    let page = client.page(&location).await;
    assert_eq!(page["props"]["order"]["status"], "fulfilled");
    assert_eq!(page["props"]["flash"]["success"], "Order marked fulfilled.");

    let resp = client.get(&format!("/orders/{id}/invoice")).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let html = resp.text().await.expect("body");
    assert!(html.contains(&format!("ORDER-{id}")));
    assert!(html.contains("Spark plug"));

    // A product on an order cannot be deleted.
    client.delete(&format!("/products/{product}")).await;
    let page = client.page(&format!("/products/{product}/edit")).await;
    assert!(page["props"]["flash"]["error"].is_string());

    let resp = client.delete(&format!("/orders/{id}")).await;
    assert_eq!(redirect_target(&resp), "/orders");
    let resp = client.delete(&format!("/products/{product}")).await;
    assert_eq!(redirect_target(&resp), "/products");
}

#[tokio::test]
#[ignore = "Requires running admin server and database"]
async fn test_shipping_order_needs_address() {
    let client = TestClient::login().await;
    let product = create_product(&client).await;

    let resp = client
        .post_json(
            "/orders",
            &json!({
                "customer_name": "Jordan Driver",
                "order_type": "ship",
                "items": [{ "product_id": product, "quantity": "1" }]
            }),
        )
        .await;
    assert_eq!(redirect_target(&resp), "/orders/create");
    let page = client.page("/orders/create").await;
    let errors = page["props"]["errors"].as_object().cloned().unwrap_or_default();
    assert!(errors.keys().any(|field| field.starts_with("shipping.")));

    client.delete(&format!("/products/{product}")).await;
}
