//! Request and response bodies of the walkway REST backend.
//!
//! Field names follow the backend's camelCase JSON. Listing and detail
//! responses keep any field not modelled here in `extra`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::geo_point::GeoPoint;

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const PREVIEW_PAGE_SIZE: u32 = 3;

/// Location based walkway search.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WalkwaySearchParams {
    pub sort: String,
    pub latitude: f64,
    pub longitude: f64,
    pub distance: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_id: Option<i64>,
    pub size: u32,
}

impl WalkwaySearchParams {
    pub fn new(sort: impl Into<String>, center: GeoPoint, distance: f64) -> Self {
        Self {
            sort: sort.into(),
            latitude: center.lat,
            longitude: center.lng,
            distance,
            last_id: None,
            size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// Every walkway, regardless of location.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AllWalkwayParams {
    pub sort: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_id: Option<i64>,
    pub size: u32,
}

impl AllWalkwayParams {
    pub fn new(sort: impl Into<String>) -> Self {
        Self {
            sort: sort.into(),
            last_id: None,
            size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// Walkways the user registered. A preview only asks for the first few.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MyWalkwaysParams {
    pub size: u32,
    pub last_id: Option<i64>,
    pub preview: bool,
}

impl Default for MyWalkwaysParams {
    fn default() -> Self {
        Self {
            size: DEFAULT_PAGE_SIZE,
            last_id: None,
            preview: false,
        }
    }
}

impl MyWalkwaysParams {
    pub fn page_size(&self) -> u32 {
        if self.preview { PREVIEW_PAGE_SIZE } else { self.size }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PageParams {
    pub size: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_id: Option<i64>,
}

impl Default for PageParams {
    fn default() -> Self {
        Self {
            size: DEFAULT_PAGE_SIZE,
            last_id: None,
        }
    }
}

impl From<MyWalkwaysParams> for PageParams {
    fn from(params: MyWalkwaysParams) -> Self {
        Self {
            size: params.page_size(),
            last_id: params.last_id,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WalkwayCard {
    pub walkway_id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub distance: f64,
    #[serde(default)]
    pub course_image_url: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct WalkwaysResponse {
    #[serde(default)]
    pub walkways: Vec<WalkwayCard>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl WalkwaysResponse {
    /// Cursor for the next page, the id of the last walkway received.
    pub fn next_cursor(&self) -> Option<i64> {
        self.walkways.last().map(|walkway| walkway.walkway_id)
    }
}

pub type WalkwayListResponse = WalkwaysResponse;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WalkwayDetail {
    #[serde(default)]
    pub walkway_id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub distance: f64,
    #[serde(default)]
    pub time: i64,
    #[serde(default)]
    pub course: Vec<GeoPoint>,
    #[serde(default)]
    pub liked: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CreateWalkway {
    pub course_image_id: i64,
    pub name: String,
    pub memo: String,
    pub distance: f64,
    pub time: i64,
    pub exposure: bool,
    pub course: Vec<GeoPoint>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UpdateWalkway {
    pub name: String,
    pub memo: String,
    pub exposure: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WalkwayIdResponse {
    pub walkway_id: i64,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CourseImageResponse {
    pub course_image_id: i64,
}

/// A finished walk: seconds walked and meters covered.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct WalkwayHistoryRequest {
    pub time: i64,
    pub distance: i64,
}

/// The history id is returned whether or not a review may be written.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WalkwayHistoryResponse {
    pub walkway_history_id: i64,
    pub can_review: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct ApiErrorResponse {
    #[serde(default)]
    pub message: Option<String>,
}

#[test]
fn search_params_use_camel_case() {
    let params = WalkwaySearchParams {
        last_id: Some(42),
        ..WalkwaySearchParams::new("rating", GeoPoint::new(37.5665, 126.978), 3.0)
    };
    let json = serde_json::to_value(&params).unwrap();
    assert_eq!(json["lastId"], 42);
    assert_eq!(json["latitude"], 37.5665);
    assert_eq!(json["size"], 10);
}

#[test]
fn preview_limits_page_size() {
    let params = MyWalkwaysParams { preview: true, size: 20, last_id: None };
    assert_eq!(PageParams::from(params).size, PREVIEW_PAGE_SIZE);
    assert_eq!(PageParams::from(MyWalkwaysParams::default()).size, DEFAULT_PAGE_SIZE);
}

#[test]
fn unknown_response_fields_are_kept() {
    let response: WalkwaysResponse = serde_json::from_str(
        r#"{"walkways":[{"walkwayId":3,"name":"Seoul Forest","distance":2.4,"rating":4.5}],"hasNext":true}"#,
    )
    .unwrap();
    assert_eq!(response.next_cursor(), Some(3));
    assert_eq!(response.walkways[0].extra["rating"], 4.5);
    assert_eq!(response.extra["hasNext"], true);
}

#[test]
fn history_response_shape() {
    let response: WalkwayHistoryResponse = serde_json::from_str(r#"{"walkwayHistoryId":11,"canReview":false}"#).unwrap();
    assert_eq!(response, WalkwayHistoryResponse { walkway_history_id: 11, can_review: false });
}
