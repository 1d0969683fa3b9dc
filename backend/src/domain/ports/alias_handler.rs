//! Port notified whenever alias correlation records a sighting.

use crate::domain::AliasSighting;

/// Callback invoked synchronously by alias correlation.
///
/// `extra` carries whatever payload the host attached to the sighting (a
/// session handle, a connection record, ...). The returned flag becomes the
/// result of the correlation call, so a handler typically answers "may this
/// player proceed".
///
/// Any `Fn(&AliasSighting, &X) -> bool` closure is a handler.
pub trait AliasHandler<X: ?Sized = ()>: Send + Sync {
    /// React to a sighting.
    fn on_alias(&self, sighting: &AliasSighting, extra: &X) -> bool;
}

impl<X, F> AliasHandler<X> for F
where
    X: ?Sized,
    F: Fn(&AliasSighting, &X) -> bool + Send + Sync,
{
    fn on_alias(&self, sighting: &AliasSighting, extra: &X) -> bool {
        self(sighting, extra)
    }
}

/// Handler that accepts every sighting.
#[derive(Debug, Default, Clone, Copy)]
pub struct AcceptAllAliases;

impl<X: ?Sized> AliasHandler<X> for AcceptAllAliases {
    fn on_alias(&self, _sighting: &AliasSighting, _extra: &X) -> bool {
        true
    }
}
