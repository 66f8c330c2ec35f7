//! Tests for manifest loading and the component factory

use super::*;
use crate::backoff::BackoffStrategy;
use crate::error::Error;
use crate::request_option::InjectInto;
use crate::retriever::Retriever;
use crate::types::Method;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const MINIMAL: &str = r#"
streams:
  - name: users
    retriever:
      requester:
        url_base: https://api.example.com
        path: /users
"#;

const FULL: &str = r#"
version: "0.50.0"
streams:
  - name: tickets
    primary_key: id
    retriever:
      requester:
        url_base: "https://{{ config.subdomain }}.example.com/api"
        path: /tickets
        http_method: POST
        request_parameters:
          sort: updated_at
        request_body_json:
          status: open
        authenticator:
          type: BearerAuthenticator
          api_token: "{{ config.api_token }}"
        error_handler:
          max_retries: 3
          backoff_strategies:
            - type: WaitTimeFromHeader
              header: Retry-After
            - type: ConstantBackoffStrategy
              backoff_time_in_seconds: 2
      record_selector:
        extractor:
          field_path: ["tickets"]
        record_filter:
          condition: "{{ record.status != 'deleted' }}"
      paginator:
        type: DefaultPaginator
        pagination_strategy:
          type: CursorPagination
          cursor_value: "{{ response.next_page }}"
          stop_condition: "{{ not response.next_page }}"
          page_size: 100
        page_token_option:
          type: RequestPath
        page_size_option:
          type: RequestOption
          inject_into: request_parameter
          field_name: per_page
      partition_router:
        type: ListPartitionRouter
        values: ["open", "closed"]
        cursor_field: status
        request_option:
          type: RequestOption
          inject_into: request_parameter
          field_name: status
    transformations:
      - type: AddFields
        fields:
          - path: ["source"]
            value: "zendesk"
      - type: RemoveFields
        field_pointers:
          - ["via"]
spec:
  connection_specification:
    type: object
    properties:
      api_token:
        type: string
        airbyte_secret: true
"#;

// ============================================================================
// Loading Tests
// ============================================================================

#[test]
fn test_load_minimal_manifest() {
    let manifest = load_manifest_from_str(MINIMAL).unwrap();

    assert_eq!(manifest.version, "0.1.0");
    assert_eq!(manifest.stream_names(), vec!["users"]);

    let retriever = &manifest.streams[0].retriever;
    assert_eq!(retriever.requester.http_method, Method::GET);
    assert!(retriever.paginator.is_none());
    assert!(retriever.partition_router.is_none());
    assert!(retriever.record_selector.extractor.field_path.is_empty());
    assert_eq!(manifest.connection_specification(), &serde_json::Value::Null);
}

#[test]
fn test_load_full_manifest() {
    let manifest = load_manifest_from_str(FULL).unwrap();
    assert_eq!(manifest.version, "0.50.0");

    let stream = manifest.stream("tickets").unwrap();
    assert_eq!(stream.primary_key, Some(PrimaryKey::Field("id".to_string())));

    let requester = &stream.retriever.requester;
    assert_eq!(requester.http_method, Method::POST);
    assert_eq!(requester.request_body_json.get("status"), Some(&json!("open")));
    assert!(matches!(
        requester.authenticator,
        Some(AuthenticatorDefinition::BearerAuthenticator { .. })
    ));

    let handler = requester.error_handler.as_ref().unwrap();
    assert_eq!(handler.max_retries, 3);
    assert_eq!(handler.backoff_strategies.len(), 2);
    assert!(matches!(
        handler.backoff_strategies[1],
        BackoffStrategyDefinition::ConstantBackoffStrategy { .. }
    ));

    match stream.retriever.paginator.as_ref().unwrap() {
        PaginatorDefinition::DefaultPaginator {
            pagination_strategy,
            page_token_option,
            page_size_option,
        } => {
            assert!(matches!(
                pagination_strategy,
                PaginationStrategyDefinition::CursorPagination {
                    page_size: Some(100),
                    ..
                }
            ));
            assert!(matches!(
                page_token_option,
                Some(PageTokenOptionDefinition::RequestPath)
            ));
            assert_eq!(
                page_size_option.as_ref().unwrap().inject_into,
                InjectInto::RequestParameter
            );
        }
        other => panic!("unexpected paginator: {other:?}"),
    }

    assert!(matches!(
        stream.retriever.partition_router,
        Some(PartitionRouterDefinition::ListPartitionRouter { .. })
    ));
    assert_eq!(stream.transformations.len(), 2);
    assert_eq!(
        manifest.connection_specification()["properties"]["api_token"]["airbyte_secret"],
        json!(true)
    );
}

#[test]
fn test_load_manifest_from_value() {
    let value = json!({
        "streams": [{
            "name": "items",
            "retriever": {
                "requester": {"url_base": "https://api.example.com", "path": "items"},
                "paginator": {
                    "type": "DefaultPaginator",
                    "pagination_strategy": {"type": "PageIncrement", "page_size": 10}
                }
            }
        }]
    });

    let manifest = load_manifest_from_value(value).unwrap();
    let paginator = manifest.streams[0].retriever.paginator.as_ref().unwrap();
    assert!(matches!(
        paginator,
        PaginatorDefinition::DefaultPaginator {
            pagination_strategy: PaginationStrategyDefinition::PageIncrement {
                start_from_page: 1,
                inject_on_first_request: false,
                ..
            },
            ..
        }
    ));
}

#[test]
fn test_load_manifest_validation() {
    let err = load_manifest_from_str("streams: []").unwrap_err();
    assert!(err.to_string().contains("at least one stream"));

    let duplicate = r#"
streams:
  - name: users
    retriever:
      requester: {url_base: "https://a"}
  - name: users
    retriever:
      requester: {url_base: "https://b"}
"#;
    let err = load_manifest_from_str(duplicate).unwrap_err();
    assert!(err.to_string().contains("Duplicate stream names"));

    let no_base = r#"
streams:
  - name: users
    retriever:
      requester: {url_base: ""}
"#;
    let err = load_manifest_from_str(no_base).unwrap_err();
    assert!(err.to_string().contains("url_base cannot be empty"));
}

#[test]
fn test_load_manifest_unknown_component() {
    let yaml = r#"
streams:
  - name: users
    retriever:
      requester: {url_base: "https://a"}
      paginator:
        type: TelepathicPaginator
"#;
    let err = load_manifest_from_str(yaml).unwrap_err();
    assert!(err.is_config_error());
    assert!(err.to_string().contains("Failed to parse manifest"));
}

#[test]
fn test_stream_not_found() {
    let manifest = load_manifest_from_str(MINIMAL).unwrap();
    let err = manifest.stream("orders").unwrap_err();
    assert!(matches!(err, Error::StreamNotFound { ref stream } if stream == "orders"));
}

#[test]
fn test_resolve_fills_defaults() {
    let manifest = load_manifest_from_str(MINIMAL).unwrap();
    let resolved = manifest.resolve().unwrap();

    assert_eq!(resolved["version"], json!("0.1.0"));
    assert_eq!(
        resolved["streams"][0]["retriever"]["requester"]["http_method"],
        json!("GET")
    );

    // The resolved form loads back to the same manifest
    let reloaded = load_manifest_from_value(resolved.clone()).unwrap();
    assert_eq!(reloaded.resolve().unwrap(), resolved);
}

#[test]
fn test_load_manifest_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(MINIMAL.as_bytes()).unwrap();

    let manifest = load_manifest(file.path()).unwrap();
    assert_eq!(manifest.streams.len(), 1);

    let err = load_manifest("/definitely/not/here.yaml").unwrap_err();
    assert!(matches!(err, Error::FileNotFound { .. }));
}

// ============================================================================
// Factory Tests
// ============================================================================

#[test]
fn test_factory_templated_page_size() {
    let factory = ComponentFactory::new(json!({"page_size": 25}));
    let definition: PaginatorDefinition = serde_json::from_value(json!({
        "type": "DefaultPaginator",
        "pagination_strategy": {"type": "OffsetIncrement", "page_size": "{{ config.page_size }}"},
        "page_size_option": {"inject_into": "request_parameter", "field_name": "limit"}
    }))
    .unwrap();

    let paginator = factory.create_paginator(Some(&definition)).unwrap();
    let params = paginator
        .request_options(InjectInto::RequestParameter, None)
        .unwrap();
    assert_eq!(params.get("limit"), Some(&json!("25")));
}

#[test]
fn test_factory_rejects_non_integer_page_size() {
    let factory = ComponentFactory::new(json!({"page_size": "lots"}));
    let definition: PaginatorDefinition = serde_json::from_value(json!({
        "type": "DefaultPaginator",
        "pagination_strategy": {"type": "PageIncrement", "page_size": "{{ config.page_size }}"}
    }))
    .unwrap();

    let err = factory.create_paginator(Some(&definition)).unwrap_err();
    assert!(err.is_config_error());
}

#[test]
fn test_factory_no_paginator() {
    let factory = ComponentFactory::new(json!({}));
    let paginator = factory.create_paginator(None).unwrap();
    assert_eq!(paginator.initial_token(), None);
}

#[test]
fn test_factory_list_router_from_config() {
    let factory = ComponentFactory::new(json!({"regions": ["us", "eu", "ap"]}));
    let definition: PartitionRouterDefinition = serde_json::from_value(json!({
        "type": "ListPartitionRouter",
        "values": "{{ config.regions }}",
        "cursor_field": "region"
    }))
    .unwrap();

    let router = factory.create_partition_router(Some(&definition)).unwrap();
    let slices = router.stream_slices().unwrap();
    assert_eq!(slices.len(), 3);
    assert_eq!(slices[2].get("region"), Some(&json!("ap")));

    let single = factory.create_partition_router(None).unwrap();
    assert_eq!(single.stream_slices().unwrap().len(), 1);
}

#[test]
fn test_factory_backoff_from_template() {
    let factory = ComponentFactory::new(json!({"wait": 3}));
    let chain = factory
        .create_backoff(&[BackoffStrategyDefinition::ConstantBackoffStrategy {
            backoff_time_in_seconds: json!("{{ config.wait }}"),
        }])
        .unwrap();

    assert_eq!(
        chain.backoff_time(None, 1).unwrap(),
        Some(Duration::from_secs(3))
    );
}

#[test]
fn test_factory_api_key_location() {
    let factory = ComponentFactory::new(json!({"key": "k"}));

    let header: AuthenticatorDefinition = serde_json::from_value(json!({
        "type": "ApiKeyAuthenticator",
        "api_token": "{{ config.key }}"
    }))
    .unwrap();
    assert!(factory.create_authenticator(&header).is_ok());

    let body: AuthenticatorDefinition = serde_json::from_value(json!({
        "type": "ApiKeyAuthenticator",
        "api_token": "{{ config.key }}",
        "inject_into": {"inject_into": "body_json", "field_name": "key"}
    }))
    .unwrap();
    let err = factory.create_authenticator(&body).unwrap_err();
    assert!(matches!(err, Error::InvalidConfigValue { ref field, .. } if field == "inject_into"));
}

#[test]
fn test_factory_oauth_requires_refresh_token() {
    let factory = ComponentFactory::new(json!({}));
    let definition: AuthenticatorDefinition = serde_json::from_value(json!({
        "type": "OAuthAuthenticator",
        "token_refresh_endpoint": "https://auth.example.com/token",
        "client_id": "id",
        "client_secret": "secret"
    }))
    .unwrap();

    let err = factory.create_authenticator(&definition).unwrap_err();
    assert!(matches!(err, Error::MissingConfigField { ref field } if field == "refresh_token"));

    let credentials: AuthenticatorDefinition = serde_json::from_value(json!({
        "type": "OAuthAuthenticator",
        "token_refresh_endpoint": "https://auth.example.com/token",
        "client_id": "id",
        "client_secret": "secret",
        "grant_type": "client_credentials"
    }))
    .unwrap();
    assert!(factory.create_authenticator(&credentials).is_ok());
}

#[tokio::test]
async fn test_factory_retriever_end_to_end() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/orders"))
        .and(header("Authorization", "Bearer tok-1"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": [{"id": 3}]})))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/orders"))
        .and(header("Authorization", "Bearer tok-1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"data": [{"id": 1}, {"id": 2}]})),
        )
        .mount(&mock_server)
        .await;

    let manifest = load_manifest_from_value(json!({
        "streams": [{
            "name": "orders",
            "retriever": {
                "requester": {
                    "url_base": "{{ config.base }}/api",
                    "path": "orders",
                    "authenticator": {"type": "BearerAuthenticator", "api_token": "{{ config.token }}"}
                },
                "record_selector": {"extractor": {"field_path": ["data"]}},
                "paginator": {
                    "type": "DefaultPaginator",
                    "pagination_strategy": {"type": "PageIncrement", "page_size": 2},
                    "page_token_option": {
                        "type": "RequestOption",
                        "inject_into": "request_parameter",
                        "field_name": "page"
                    }
                }
            },
            "transformations": [
                {"type": "AddFields", "fields": [{"path": ["shop"], "value": "{{ config.shop }}"}]}
            ]
        }]
    }))
    .unwrap();

    let config = json!({"base": mock_server.uri(), "token": "tok-1", "shop": "north"});
    let factory = ComponentFactory::new(config);
    let mut retriever = factory
        .create_retriever(manifest.stream("orders").unwrap())
        .unwrap();

    let slice = Arc::new(retriever.stream_slices().unwrap().remove(0));
    let mut cursor = retriever.start_slice(&slice).unwrap();
    let mut ids = Vec::new();
    while cursor.has_more() {
        let page = retriever.fetch_next_page(&slice, &mut cursor).await.unwrap();
        for record in &page.records {
            assert_eq!(record.get("shop"), Some(&json!("north")));
            ids.push(record.get("id").cloned().unwrap());
        }
    }
    assert_eq!(ids, vec![json!(1), json!(2), json!(3)]);
}
