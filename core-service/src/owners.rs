//! Book owners: display names, chat channel descriptors, and map pins.

use crate::error::{CoreError, Result};
use bridge_traits::geo::{Coordinates, Geocoder};
use core_library::models::UNKNOWN_USER;
use core_library::repositories::{BookRepository, UserRepository};
use core_library::{Book, LibraryError, UserProfile};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

pub const CHANNEL_TYPE: &str = "messaging";

/// An owner as shown next to a book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerInfo {
    pub uid: String,
    pub display_name: String,
}

impl OwnerInfo {
    fn from_profile(uid: &str, profile: Option<&UserProfile>) -> Self {
        Self {
            uid: uid.to_string(),
            display_name: profile
                .map(UserProfile::display_name)
                .unwrap_or_else(|| UNKNOWN_USER.to_string()),
        }
    }
}

/// Identifiers for a one-to-one chat about a book. The chat backend
/// itself lives in the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatChannel {
    pub id: String,
    pub channel_type: String,
    pub members: Vec<String>,
    pub name: String,
}

impl ChatChannel {
    /// Channel opened by `current` to talk to `owner`.
    ///
    /// ```
    /// use core_service::owners::{ChatChannel, OwnerInfo};
    ///
    /// let me = OwnerInfo { uid: "u1".into(), display_name: "Ann".into() };
    /// let owner = OwnerInfo { uid: "u2".into(), display_name: "Bo".into() };
    /// let channel = ChatChannel::between(&me, &owner);
    ///
    /// assert_eq!(channel.id, "u1_u2");
    /// assert_eq!(channel.name, "Bo and Ann");
    /// ```
    pub fn between(current: &OwnerInfo, owner: &OwnerInfo) -> Self {
        Self {
            id: format!("{}_{}", current.uid, owner.uid),
            channel_type: CHANNEL_TYPE.to_string(),
            members: vec![current.uid.clone(), owner.uid.clone()],
            name: format!("{} and {}", owner.display_name, current.display_name),
        }
    }
}

/// A listed book placed at one owner's geocoded home address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapPin {
    pub book: Book,
    pub owner: OwnerInfo,
    pub location: Coordinates,
    /// Kilometres from the query center, when one was given.
    pub distance_km: Option<f64>,
}

/// Where to center a pin query and how far out to look.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct NearbyQuery {
    pub center: Option<Coordinates>,
    pub radius_km: Option<f64>,
}

impl NearbyQuery {
    pub fn around(center: Coordinates) -> Self {
        Self {
            center: Some(center),
            radius_km: None,
        }
    }

    pub fn within_km(mut self, radius_km: f64) -> Self {
        self.radius_km = Some(radius_km);
        self
    }
}

#[derive(Clone)]
pub struct OwnerService {
    books: Arc<dyn BookRepository>,
    users: Arc<dyn UserRepository>,
    geocoder: Option<Arc<dyn Geocoder>>,
    map_pins_enabled: bool,
}

impl OwnerService {
    pub(crate) fn new(
        books: Arc<dyn BookRepository>,
        users: Arc<dyn UserRepository>,
        geocoder: Option<Arc<dyn Geocoder>>,
        map_pins_enabled: bool,
    ) -> Self {
        Self {
            books,
            users,
            geocoder,
            map_pins_enabled,
        }
    }

    /// Profile for `uid`, or `None` when the stored node cannot be read.
    /// Database failures are still returned.
    async fn readable_profile(&self, uid: &str) -> Result<Option<UserProfile>> {
        match self.users.find(uid).await {
            Ok(profile) => Ok(profile),
            Err(e @ LibraryError::Bridge(_)) => Err(e.into()),
            Err(e) => {
                warn!(uid = %uid, error = %e, "Skipping unreadable profile");
                Ok(None)
            }
        }
    }

    async fn profiles(&self, uids: &[String]) -> Result<HashMap<String, UserProfile>> {
        let found = join_all(uids.iter().map(|uid| self.readable_profile(uid))).await;
        let mut profiles = HashMap::new();
        for (uid, profile) in uids.iter().zip(found) {
            if let Some(profile) = profile? {
                profiles.insert(uid.clone(), profile);
            }
        }
        Ok(profiles)
    }

    /// Display info for `uid`. Missing or unreadable profiles give the
    /// placeholder name.
    pub async fn owner_info(&self, uid: &str) -> Result<OwnerInfo> {
        let profile = self.readable_profile(uid).await?;
        Ok(OwnerInfo::from_profile(uid, profile.as_ref()))
    }

    /// Owners of a book with display names, in stored order.
    pub async fn owners_of(&self, isbn: &str) -> Result<Vec<OwnerInfo>> {
        let uids = self.books.owners(isbn).await?;
        let profiles = self.profiles(&uids).await?;
        Ok(uids
            .iter()
            .map(|uid| OwnerInfo::from_profile(uid, profiles.get(uid)))
            .collect())
    }

    /// Chat channel for `current_uid` contacting `owner_uid`.
    pub async fn chat_channel(&self, current_uid: &str, owner_uid: &str) -> Result<ChatChannel> {
        if current_uid == owner_uid {
            return Err(CoreError::InvalidRequest(
                "Cannot open a chat channel with yourself".to_string(),
            ));
        }
        let current = self.owner_info(current_uid).await?;
        let owner = self.owner_info(owner_uid).await?;
        Ok(ChatChannel::between(&current, &owner))
    }

    /// Pins for every listed book with a cover, one per owner with a home
    /// address.
    ///
    /// Addresses that fail to geocode are skipped. With a center, pins are
    /// sorted nearest first and, with a radius, limited to it.
    ///
    /// # Errors
    /// `FeatureDisabled` when map pins are off, `CapabilityMissing` when no
    /// geocoder is configured
    pub async fn map_pins(&self, nearby: NearbyQuery) -> Result<Vec<MapPin>> {
        if !self.map_pins_enabled {
            return Err(CoreError::FeatureDisabled("map pins".to_string()));
        }
        let geocoder = self
            .geocoder
            .as_ref()
            .ok_or_else(|| CoreError::CapabilityMissing {
                capability: "geocoder".to_string(),
                message: "Map pins need a Geocoder bridge".to_string(),
            })?;

        let books: Vec<_> = self
            .books
            .list_all()
            .await?
            .into_iter()
            .map(|record| {
                let owners = record.owners.clone();
                (record.to_book(&record.isbn), owners)
            })
            .filter(|(book, _)| book.has_cover())
            .collect();

        let mut uids: Vec<String> = books.iter().flat_map(|(_, owners)| owners.clone()).collect();
        uids.sort();
        uids.dedup();
        let profiles = self.profiles(&uids).await?;

        let mut locations: HashMap<String, Option<Coordinates>> = HashMap::new();
        for profile in profiles.values().filter(|p| p.has_address()) {
            let address = profile.home_address.trim().to_string();
            if locations.contains_key(&address) {
                continue;
            }
            let location = match geocoder.geocode(&address).await {
                Ok(Some(coords)) if coords.is_valid() => Some(coords),
                Ok(_) => {
                    debug!(uid = %profile.uid, "Address did not geocode");
                    None
                }
                Err(e) => {
                    warn!(uid = %profile.uid, error = %e, "Geocoding failed");
                    None
                }
            };
            locations.insert(address, location);
        }

        let mut pins = Vec::new();
        for (book, owners) in &books {
            for uid in owners {
                let Some(profile) = profiles.get(uid) else {
                    continue;
                };
                let Some(Some(location)) = locations.get(profile.home_address.trim()) else {
                    continue;
                };
                let distance_km = nearby.center.map(|center| center.distance_km(location));
                if let (Some(distance), Some(radius)) = (distance_km, nearby.radius_km) {
                    if distance > radius {
                        continue;
                    }
                }
                pins.push(MapPin {
                    book: book.clone(),
                    owner: OwnerInfo::from_profile(uid, Some(profile)),
                    location: *location,
                    distance_km,
                });
            }
        }

        if nearby.center.is_some() {
            pins.sort_by(|a, b| {
                a.distance_km
                    .partial_cmp(&b.distance_km)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
        }
        Ok(pins)
    }
}
