pub mod api;
pub mod error;
pub mod layers;
pub mod project;
pub mod transform;
pub mod url_state;
pub mod view;
pub mod visibility;

pub use api::{HealthResponse, TokenResponse};
pub use error::MapError;
pub use layers::*;
pub use project::*;
pub use transform::{GeoPoint, TransformedCoordinate, koordtrans_url};
pub use url_state::{UrlState, join_query};
pub use view::*;
pub use visibility::Visibility;
