//! Wire constants shared with the hub: headers, MIME types, parameter
//! names and route templates.

// Parameters
pub const ID: &str = "id";
pub const ID2: &str = "id2";
pub const KEY: &str = "key";
pub const NAME: &str = "name";
pub const WILDCARD: &str = "wildcard";
pub const FILE_FIELD: &str = "file";

// Headers
pub const ACCEPT: &str = "Accept";
pub const AUTHORIZATION: &str = "Authorization";
pub const CONTENT_TYPE: &str = "Content-Type";
pub const DIRECTORY: &str = "X-Directory";
pub const DIRECTORY_EXPAND: &str = "expand";

// MIME types
pub const MIME_JSON: &str = "application/json";
pub const MIME_YAML: &str = "application/x-yaml";
pub const MIME_OCTET_STREAM: &str = "application/octet-stream";

// Routes - Applications
pub const APPLICATIONS_ROUTE: &str = "/applications";
pub const APPLICATION_ROUTE: &str = "/applications/:id";
pub const APP_BUCKET_ROUTE: &str = "/applications/:id/bucket";
pub const APP_BUCKET_CONTENT_ROUTE: &str = "/applications/:id/bucket/*wildcard";

// Routes - Auth
pub const AUTH_LOGIN_ROUTE: &str = "/auth/login";
pub const AUTH_REFRESH_ROUTE: &str = "/auth/refresh";

// Routes - Buckets
pub const BUCKETS_ROUTE: &str = "/buckets";
pub const BUCKET_ROUTE: &str = "/buckets/:id";
pub const BUCKET_CONTENT_ROUTE: &str = "/buckets/:id/*wildcard";

// Routes - Files
pub const FILES_ROUTE: &str = "/files";
pub const FILE_ROUTE: &str = "/files/:id";

// Routes - Settings
pub const SETTINGS_ROUTE: &str = "/settings";
pub const SETTING_ROUTE: &str = "/settings/:key";

// Routes - Tasks
pub const TASKS_ROUTE: &str = "/tasks";
pub const TASK_ROUTE: &str = "/tasks/:id";
pub const TASK_BUCKET_CONTENT_ROUTE: &str = "/tasks/:id/bucket/*wildcard";
