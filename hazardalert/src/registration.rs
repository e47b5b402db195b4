//! Registering new hazards.
use crate::{
    coord::Coordinate,
    error::RegistrationError,
    hazard::{next_id, Hazard},
    store::HazardStore,
};
#[cfg(feature = "tracing")]
use tracing::{info, instrument};

/// Prefix of generated hazard ids.
pub const DEFAULT_ID_PREFIX: &str = "acc";

/// What the user has entered so far.
///
/// Submitting never consumes or clears the form, so a failed save can be
/// retried as is.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegistrationForm {
    /// `YYYY-MM-DD` or `YYYY-MM`.
    pub occurred_at: String,
    /// Text read out in alerts.
    pub description: String,
    /// Kind of incident, may be empty.
    pub category: String,
    /// Picked location.
    pub coordinate: Option<Coordinate>,
}

impl RegistrationForm {
    /// Check the form, reporting the first missing field in the order date,
    /// description, location.
    ///
    /// # Errors
    ///
    /// Returns the first missing field.
    pub fn validate(&self) -> Result<Coordinate, RegistrationError> {
        if self.occurred_at.trim().is_empty() {
            return Err(RegistrationError::MissingOccurredAt);
        }
        if self.description.trim().is_empty() {
            return Err(RegistrationError::MissingDescription);
        }
        self.coordinate.ok_or(RegistrationError::MissingLocation)
    }

    /// Build the hazard this form describes, with the given id.
    ///
    /// # Errors
    ///
    /// Fails like [`Self::validate`].
    pub fn to_hazard(&self, id: String) -> Result<Hazard, RegistrationError> {
        let coordinate = self.validate()?;

        Ok(Hazard {
            id,
            coordinate,
            description: self.description.trim().to_owned(),
            occurred_at: self.occurred_at.trim().to_owned(),
            category: self.category.trim().to_owned(),
        })
    }

    /// Validate, assign the next id and append to `store`.
    ///
    /// The id is computed from the store's current contents. Concurrent
    /// registrations against the same store may compute the same id.
    ///
    /// # Errors
    ///
    /// Validation errors, or [`RegistrationError::Save`] if the store could
    /// not be read or written. The form is left untouched either way.
    #[cfg_attr(feature = "tracing", instrument(skip(self, store)))]
    pub async fn submit(
        &self,
        store: &dyn HazardStore,
        id_prefix: &str,
    ) -> Result<Hazard, RegistrationError> {
        self.validate()?;

        let existing = store.fetch_all().await?;
        let hazard = self.to_hazard(next_id(id_prefix, &existing))?;
        store.append(hazard.clone()).await?;

        #[cfg(feature = "tracing")]
        info!(id = %hazard.id, "hazard registered");

        Ok(hazard)
    }
}
