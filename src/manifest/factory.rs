//! Component factory
//!
//! Resolves manifest definitions into runtime components. Templates that
//! only depend on the config (auth secrets, page sizes, backoff times) are
//! resolved here, once; construction errors are fatal to the run.

use super::types::{
    AuthenticatorDefinition, BackoffStrategyDefinition, OAuthDefinition, PageTokenOptionDefinition,
    PaginationStrategyDefinition, PaginatorDefinition, PartitionRouterDefinition,
    RecordSelectorDefinition, RequesterDefinition, StreamDefinition, TransformationDefinition,
};
use crate::auth::{AuthConfig, Authenticator, Location, OAuth2Config, RefreshTokenUpdater};
use crate::backoff::{
    Backoff, BackoffChain, ConstantBackoffStrategy, ExponentialBackoffStrategy,
    WaitTimeFromHeaderBackoffStrategy,
};
use crate::error::{Error, Result};
use crate::http::{ExchangeObserver, HttpClient, HttpClientConfig};
use crate::interpolation::{InterpolatedString, InterpolationContext};
use crate::pagination::{
    CursorPaginationStrategy, DefaultPaginator, NoPagination, OffsetIncrementStrategy,
    PageIncrementStrategy, PageTokenOption, Pagination, Paginator,
};
use crate::partition::{ListPartitionRouter, PartitionRouter, Router, SinglePartitionRouter};
use crate::request_option::InjectInto;
use crate::retriever::{AddedField, RecordSelector, Requester, SimpleRetriever, Transformation};
use crate::secrets::SecretRegistry;
use crate::types::{value_to_string, Config, JsonValue};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Header used by API key auth when the manifest names none
const DEFAULT_API_KEY_HEADER: &str = "X-API-Key";

/// Builds runtime components from manifest definitions
#[derive(Debug, Clone)]
pub struct ComponentFactory {
    config: Config,
    observer: ExchangeObserver,
    secrets: SecretRegistry,
}

impl ComponentFactory {
    /// Create a factory over the user config
    pub fn new(config: Config) -> Self {
        Self {
            config,
            observer: ExchangeObserver::new(),
            secrets: SecretRegistry::new(),
        }
    }

    /// Record token requests and config updates on this observer
    #[must_use]
    pub fn with_observer(mut self, observer: ExchangeObserver) -> Self {
        self.observer = observer;
        self
    }

    /// Register issued tokens in this registry
    #[must_use]
    pub fn with_secrets(mut self, secrets: SecretRegistry) -> Self {
        self.secrets = secrets;
        self
    }

    /// The observer handed to authenticators
    pub fn observer(&self) -> &ExchangeObserver {
        &self.observer
    }

    /// Build the retriever for a stream
    pub fn create_retriever(&self, stream: &StreamDefinition) -> Result<SimpleRetriever> {
        let definition = &stream.retriever;
        let client = self.create_http_client(&definition.requester)?;
        let retriever = SimpleRetriever::new(
            stream.name.as_str(),
            self.create_requester(&definition.requester),
            self.create_partition_router(definition.partition_router.as_ref())?,
            self.create_paginator(definition.paginator.as_ref())?,
            self.create_record_selector(&definition.record_selector, &stream.transformations),
            Arc::new(client),
            self.config.clone(),
        );
        debug!(stream = %stream.name, "Created retriever");
        Ok(retriever)
    }

    /// Build the templated request definition
    pub fn create_requester(&self, definition: &RequesterDefinition) -> Requester {
        Requester::new(definition.url_base.as_str(), definition.path.as_str())
            .with_method(definition.http_method)
            .with_parameters(definition.request_parameters.clone())
            .with_headers(definition.request_headers.clone())
            .with_body_data(definition.request_body_data.clone())
            .with_body_json(definition.request_body_json.clone())
    }

    /// Build the HTTP client with retry policy and authentication
    pub fn create_http_client(&self, definition: &RequesterDefinition) -> Result<HttpClient> {
        let handler = definition.error_handler.clone().unwrap_or_default();
        let config = HttpClientConfig::builder()
            .max_retries(handler.max_retries)
            .build();
        let mut client = HttpClient::with_config(config)?
            .with_backoff(Arc::new(self.create_backoff(&handler.backoff_strategies)?));
        if let Some(authenticator) = &definition.authenticator {
            client = client.with_authenticator(Arc::new(self.create_authenticator(authenticator)?));
        }
        Ok(client)
    }

    /// Build the backoff chain; an empty list yields the default exponential backoff
    pub fn create_backoff(&self, definitions: &[BackoffStrategyDefinition]) -> Result<BackoffChain> {
        let strategies = definitions
            .iter()
            .map(|definition| self.create_backoff_strategy(definition))
            .collect::<Result<Vec<_>>>()?;
        Ok(BackoffChain::new(strategies))
    }

    fn create_backoff_strategy(&self, definition: &BackoffStrategyDefinition) -> Result<Backoff> {
        Ok(match definition {
            BackoffStrategyDefinition::ConstantBackoffStrategy {
                backoff_time_in_seconds,
            } => Backoff::Constant(ConstantBackoffStrategy::from_config(
                backoff_time_in_seconds,
                &self.config,
            )?),
            BackoffStrategyDefinition::ExponentialBackoffStrategy { factor } => {
                Backoff::Exponential(ExponentialBackoffStrategy::from_config(factor, &self.config)?)
            }
            BackoffStrategyDefinition::WaitTimeFromHeader {
                header,
                regex,
                max_waiting_time_in_seconds,
            } => {
                let mut strategy = WaitTimeFromHeaderBackoffStrategy::new(header.as_str());
                if let Some(pattern) = regex {
                    strategy = strategy.with_regex(pattern)?;
                }
                if let Some(max) = max_waiting_time_in_seconds {
                    let max = Duration::try_from_secs_f64(*max).map_err(|_| {
                        Error::invalid_value(
                            "max_waiting_time_in_seconds",
                            format!("expected a non-negative number of seconds, got {max}"),
                        )
                    })?;
                    strategy = strategy.with_max_waiting_time(max);
                }
                Backoff::WaitTimeFromHeader(strategy)
            }
        })
    }

    /// Build an authenticator, resolving its templates against the config
    pub fn create_authenticator(&self, definition: &AuthenticatorDefinition) -> Result<Authenticator> {
        let config = match definition {
            AuthenticatorDefinition::NoAuth => AuthConfig::None,
            AuthenticatorDefinition::ApiKeyAuthenticator {
                api_token,
                inject_into,
            } => {
                let (location, name) = match inject_into {
                    None => (Location::Header, DEFAULT_API_KEY_HEADER.to_string()),
                    Some(option) => {
                        let location = match option.inject_into {
                            InjectInto::Header => Location::Header,
                            InjectInto::RequestParameter => Location::Query,
                            other => {
                                return Err(Error::invalid_value(
                                    "inject_into",
                                    format!("API keys go in a header or request parameter, not {other:?}"),
                                ))
                            }
                        };
                        (location, option.field_name.eval_string(&self.context())?)
                    }
                };
                AuthConfig::ApiKey {
                    location,
                    name,
                    prefix: None,
                    value: self.render(api_token)?,
                }
            }
            AuthenticatorDefinition::BearerAuthenticator { api_token } => AuthConfig::Bearer {
                token: self.render(api_token)?,
            },
            AuthenticatorDefinition::BasicHttpAuthenticator { username, password } => {
                AuthConfig::Basic {
                    username: self.render(username)?,
                    password: self.render(password)?,
                }
            }
            AuthenticatorDefinition::OAuthAuthenticator(oauth) => {
                AuthConfig::OAuth2(self.create_oauth(oauth)?)
            }
        };

        Ok(Authenticator::new(config)
            .with_observer(self.observer.clone())
            .with_secrets(self.secrets.clone()))
    }

    fn create_oauth(&self, definition: &OAuthDefinition) -> Result<OAuth2Config> {
        let token_url = self.render(&definition.token_refresh_endpoint)?;
        let client_id = self.render(&definition.client_id)?;
        let client_secret = self.render(&definition.client_secret)?;

        let mut oauth = match definition.grant_type.as_str() {
            "refresh_token" => {
                let refresh_token = definition
                    .refresh_token
                    .as_deref()
                    .ok_or_else(|| Error::missing_field("refresh_token"))?;
                OAuth2Config::refresh_token(
                    token_url,
                    client_id,
                    client_secret,
                    self.render(refresh_token)?,
                )
            }
            "client_credentials" => OAuth2Config::client_credentials(token_url, client_id, client_secret),
            other => {
                return Err(Error::invalid_value(
                    "grant_type",
                    format!("expected refresh_token or client_credentials, got '{other}'"),
                ))
            }
        };

        oauth.scopes.clone_from(&definition.scopes);
        oauth.access_token_name.clone_from(&definition.access_token_name);
        oauth.expires_in_name.clone_from(&definition.expires_in_name);
        let mut body = BTreeMap::new();
        for (key, value) in &definition.refresh_request_body {
            let value = match value {
                JsonValue::String(template) => self.render(template)?,
                other => value_to_string(other),
            };
            body.insert(key.clone(), value);
        }
        oauth.refresh_request_body = body;

        if let Some(updater) = &definition.refresh_token_updater {
            oauth.refresh_token_name.clone_from(&updater.refresh_token_name);
            oauth.refresh_token_updater = Some(RefreshTokenUpdater {
                config: self.config.clone(),
                refresh_token_config_path: updater.refresh_token_config_path.clone(),
                access_token_config_path: updater.access_token_config_path.clone(),
                token_expiry_date_config_path: updater.token_expiry_date_config_path.clone(),
            });
        }
        Ok(oauth)
    }

    /// Build the paginator; none means one page per partition
    pub fn create_paginator(&self, definition: Option<&PaginatorDefinition>) -> Result<Box<dyn Paginator>> {
        let Some(PaginatorDefinition::DefaultPaginator {
            pagination_strategy,
            page_token_option,
            page_size_option,
        }) = definition
        else {
            return Ok(Box::new(NoPagination));
        };

        let strategy = match pagination_strategy {
            PaginationStrategyDefinition::CursorPagination {
                cursor_value,
                stop_condition,
                page_size,
            } => {
                let mut strategy =
                    CursorPaginationStrategy::new(cursor_value.as_str(), self.config.clone());
                if let Some(condition) = stop_condition {
                    strategy = strategy.with_stop_condition(condition.clone());
                }
                if let Some(size) = page_size {
                    strategy = strategy.with_page_size(*size);
                }
                Pagination::Cursor(strategy)
            }
            PaginationStrategyDefinition::PageIncrement {
                page_size,
                start_from_page,
                inject_on_first_request,
            } => Pagination::PageIncrement(
                PageIncrementStrategy::from_config(*start_from_page, page_size.as_ref(), &self.config)?
                    .inject_on_first_request(*inject_on_first_request),
            ),
            PaginationStrategyDefinition::OffsetIncrement {
                page_size,
                inject_on_first_request,
            } => Pagination::OffsetIncrement(
                OffsetIncrementStrategy::from_config(page_size.as_ref(), &self.config)?
                    .inject_on_first_request(*inject_on_first_request),
            ),
        };

        let mut paginator = DefaultPaginator::new(strategy, self.config.clone());
        match page_token_option {
            Some(PageTokenOptionDefinition::RequestOption(option)) => {
                paginator = paginator
                    .with_page_token_option(PageTokenOption::RequestOption(option.clone()));
            }
            Some(PageTokenOptionDefinition::RequestPath) => {
                paginator = paginator.with_page_token_option(PageTokenOption::RequestPath);
            }
            None => {}
        }
        if let Some(option) = page_size_option {
            paginator = paginator.with_page_size_option(option.clone());
        }
        Ok(Box::new(paginator))
    }

    /// Build the partition router; none means a single empty partition
    pub fn create_partition_router(
        &self,
        definition: Option<&PartitionRouterDefinition>,
    ) -> Result<Box<dyn PartitionRouter>> {
        let router = match definition {
            None | Some(PartitionRouterDefinition::SinglePartitionRouter) => {
                Router::Single(SinglePartitionRouter)
            }
            Some(PartitionRouterDefinition::ListPartitionRouter {
                values,
                cursor_field,
                request_option,
            }) => {
                let mut router = ListPartitionRouter::from_config(values, cursor_field, &self.config)?;
                if let Some(option) = request_option {
                    router = router.with_request_option(option.clone());
                }
                Router::List(router)
            }
        };
        Ok(Box::new(router))
    }

    /// Build the record selector with the stream's transformations
    pub fn create_record_selector(
        &self,
        definition: &RecordSelectorDefinition,
        transformations: &[TransformationDefinition],
    ) -> RecordSelector {
        let field_path = definition
            .extractor
            .field_path
            .iter()
            .map(|segment| InterpolatedString::new(segment.as_str()))
            .collect();

        let transformations = transformations
            .iter()
            .map(|transformation| match transformation {
                TransformationDefinition::AddFields { fields } => Transformation::AddFields(
                    fields
                        .iter()
                        .map(|field| AddedField {
                            path: field.path.clone(),
                            value: InterpolatedString::new(field.value.as_str()),
                        })
                        .collect(),
                ),
                TransformationDefinition::RemoveFields { field_pointers } => {
                    Transformation::RemoveFields(field_pointers.clone())
                }
            })
            .collect();

        let mut selector = RecordSelector::new(field_path).with_transformations(transformations);
        if let Some(filter) = &definition.record_filter {
            selector = selector.with_filter(filter.condition.clone());
        }
        selector
    }

    fn context(&self) -> InterpolationContext<'_> {
        InterpolationContext::new(&self.config)
    }

    fn render(&self, template: &str) -> Result<String> {
        InterpolatedString::new(template).eval_string(&self.context())
    }
}
