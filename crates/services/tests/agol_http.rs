// Feature service client against a mock portal.

use httpmock::prelude::*;
use serde_json::{json, Map};
use uocc_services::agol::{Feature, Point, SpatialReference};
use uocc_services::{FeatureServiceClient, ServiceError};

fn authed(server: &MockServer) -> FeatureServiceClient {
    server.mock(|when, then| {
        when.method(POST)
            .path("/sharing/rest/generateToken")
            .form_urlencoded_tuple("username", "skid")
            .form_urlencoded_tuple("password", "pw");
        then.status(200).json_body(json!({ "token": "agol-token", "expires": 1, "ssl": true }));
    });
    let mut client = FeatureServiceClient::new(server.base_url()).unwrap();
    client.authenticate("skid", "pw").unwrap();
    client
}

#[test]
fn rejected_credentials_are_an_auth_error() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/sharing/rest/generateToken");
        then.status(200).json_body(json!({ "error": {
            "code": 400,
            "message": "Unable to generate token.",
            "details": ["Invalid username or password."]
        }}));
    });

    let mut client = FeatureServiceClient::new(server.base_url()).unwrap();
    let err = client.authenticate("skid", "wrong").unwrap_err();

    assert!(matches!(err, ServiceError::Auth(_)), "{err}");
    assert!(err.to_string().contains("Invalid username or password"));
}

#[test]
fn first_layer_and_aliases() {
    let server = MockServer::start();
    let client = authed(&server);
    let layer_url = format!("{}/arcgis/rest/services/Responses/FeatureServer/0", server.base_url());
    server.mock(|when, then| {
        when.method(GET)
            .path("/sharing/rest/content/items/resp-item")
            .query_param("token", "agol-token");
        then.status(200).json_body(json!({
            "id": "resp-item",
            "owner": "uocc_admin",
            "title": "UOCC survey responses",
            "type": "Feature Service",
            "url": format!("{}/arcgis/rest/services/Responses/FeatureServer", server.base_url())
        }));
    });
    server.mock(|when, then| {
        when.method(GET).path("/arcgis/rest/services/Responses/FeatureServer/0");
        then.status(200).json_body(json!({ "fields": [
            { "name": "GlobalID", "alias": "GlobalID", "type": "esriFieldTypeGlobalID" },
            { "name": "q1", "alias": "1. Do you accept oil?", "type": "esriFieldTypeString" },
            { "name": "q1_comments", "alias": "Comments", "type": "esriFieldTypeString" },
            { "name": "lhd", "type": "esriFieldTypeString" }
        ]}));
    });

    assert_eq!(client.first_layer_url("resp-item").unwrap(), layer_url);
    let aliases = client.field_aliases(&layer_url).unwrap();
    assert_eq!(
        aliases,
        vec![
            ("GlobalID".to_string(), "GlobalID".to_string()),
            ("q1".to_string(), "1. Do you accept oil?".to_string()),
            ("q1_comments".to_string(), "Comments".to_string()),
            ("lhd".to_string(), "lhd".to_string()),
        ]
    );
}

#[test]
fn query_pages_until_transfer_limit_clears() {
    let server = MockServer::start();
    let client = authed(&server);
    let layer_url = format!("{}/svc/FeatureServer/0", server.base_url());
    server.mock(|when, then| {
        when.method(GET).path("/svc/FeatureServer/0");
        then.status(200).json_body(json!({ "fields": [
            { "name": "GlobalID", "type": "esriFieldTypeGlobalID" },
            { "name": "CreationDate", "type": "esriFieldTypeDate" },
            { "name": "count", "type": "esriFieldTypeInteger" }
        ]}));
    });
    let first = server.mock(|when, then| {
        when.method(GET)
            .path("/svc/FeatureServer/0/query")
            .query_param("resultOffset", "0")
            .query_param("returnGeometry", "false");
        then.status(200).json_body(json!({
            "features": [
                { "attributes": { "GlobalID": "{A}", "CreationDate": 1714564800000i64, "count": 3 } },
                { "attributes": { "GlobalID": "{B}", "CreationDate": null, "count": null } }
            ],
            "exceededTransferLimit": true
        }));
    });
    let second = server.mock(|when, then| {
        when.method(GET)
            .path("/svc/FeatureServer/0/query")
            .query_param("resultOffset", "2");
        then.status(200).json_body(json!({
            "features": [{ "attributes": { "GlobalID": "{C}", "count": 1 } }]
        }));
    });

    let table = client.query_table(&layer_url).unwrap();

    first.assert();
    second.assert();
    assert_eq!(table.columns(), &["GlobalID", "CreationDate", "count"]);
    assert_eq!(table.len(), 3);
    assert_eq!(table.get(0, "CreationDate"), Some("2024-05-01 12:00:00"));
    assert_eq!(table.get(0, "count"), Some("3"));
    assert_eq!(table.get(1, "count"), None);
    assert_eq!(table.get(2, "CreationDate"), None);
}

#[test]
fn truncate_and_load_chunks_features() {
    let server = MockServer::start();
    let client = authed(&server);
    let layer_url = format!("{}/svc/FeatureServer/0", server.base_url());
    let delete = server.mock(|when, then| {
        when.method(POST)
            .path("/svc/FeatureServer/0/deleteFeatures")
            .form_urlencoded_tuple("where", "1=1")
            .form_urlencoded_tuple("token", "agol-token");
        then.status(200).json_body(json!({ "deleteResults": [] }));
    });
    let results: Vec<_> = (0..500).map(|i| json!({ "objectId": i, "success": true })).collect();
    let add = server.mock(|when, then| {
        when.method(POST).path("/svc/FeatureServer/0/addFeatures");
        then.status(200).json_body(json!({ "addResults": results }));
    });

    let features: Vec<Feature> = (0..750)
        .map(|i| {
            let mut attributes = Map::new();
            attributes.insert("ID_".into(), json!(i.to_string()));
            Feature {
                attributes,
                geometry: Some(Point {
                    x: -12_400_000.0,
                    y: 4_900_000.0,
                    spatial_reference: SpatialReference { wkid: 3857 },
                }),
            }
        })
        .collect();

    let added = client.truncate_and_load(&layer_url, &features).unwrap();

    delete.assert();
    add.assert_calls(2);
    // the mock answers 500 results per request
    assert_eq!(added, 1000);
}

#[test]
fn rejected_feature_fails_the_load() {
    let server = MockServer::start();
    let client = authed(&server);
    let layer_url = format!("{}/svc/FeatureServer/0", server.base_url());
    server.mock(|when, then| {
        when.method(POST).path("/svc/FeatureServer/0/addFeatures");
        then.status(200).json_body(json!({ "addResults": [
            { "objectId": 1, "success": true },
            { "success": false, "error": { "code": 1000, "description": "bad geometry" } }
        ]}));
    });

    let features = vec![
        Feature { attributes: Map::new(), geometry: None },
        Feature { attributes: Map::new(), geometry: None },
    ];
    let err = client.add_features(&layer_url, &features).unwrap_err();
    assert!(err.to_string().contains("bad geometry"), "{err}");
}

#[test]
fn embedded_error_object_is_surfaced() {
    let server = MockServer::start();
    let client = authed(&server);
    server.mock(|when, then| {
        when.method(GET).path("/sharing/rest/content/items/gone");
        then.status(200).json_body(json!({ "error": { "code": 400, "message": "Item does not exist or is inaccessible." } }));
    });

    let err = client.item("gone").unwrap_err();
    assert_eq!(
        err,
        ServiceError::Remote {
            code: 400,
            message: "Item does not exist or is inaccessible.".into()
        }
    );
}

#[test]
fn survey_data_round_trip() {
    let server = MockServer::start();
    let client = authed(&server);
    server.mock(|when, then| {
        when.method(GET).path("/sharing/rest/content/items/survey-item");
        then.status(200).json_body(json!({
            "id": "survey-item",
            "owner": "uocc_admin",
            "title": "UOCC survey",
            "type": "Form"
        }));
    });
    let download = server.mock(|when, then| {
        when.method(GET)
            .path("/sharing/rest/content/items/survey-item/data")
            .query_param("token", "agol-token");
        then.status(200).body(b"PK\x03\x04bundle".to_vec());
    });
    let upload = server.mock(|when, then| {
        when.method(POST)
            .path("/sharing/rest/content/users/uocc_admin/items/survey-item/update")
            .body_includes("name=\"file\"; filename=\"uocc_survey.zip\"");
        then.status(200).json_body(json!({ "success": true, "id": "survey-item" }));
    });

    let item = client.item("survey-item").unwrap();
    let bytes = client.download_item_data(&item.id).unwrap();
    assert_eq!(bytes, b"PK\x03\x04bundle");
    client.update_item_data(&item, "uocc_survey.zip", bytes).unwrap();

    download.assert();
    upload.assert();
}

#[test]
fn unacknowledged_update_is_an_error() {
    let server = MockServer::start();
    let client = authed(&server);
    server.mock(|when, then| {
        when.method(POST).path("/sharing/rest/content/users/me/items/x/update");
        then.status(200).json_body(json!({ "success": false }));
    });
    let item = uocc_services::ItemInfo {
        id: "x".into(),
        title: String::new(),
        name: None,
        owner: "me".into(),
        url: None,
        item_type: "Form".into(),
    };
    assert!(client.update_item_data(&item, "f.zip", vec![1, 2, 3]).is_err());
}
