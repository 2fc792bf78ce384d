//! Vue en lecture seule sur une région mémoire appartenant au runtime natif

use thiserror::Error;

/// Erreurs de lecture dans une vue mémoire étrangère
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ViewError {
    #[error("lecture hors limites: {address:#x} + {len} hors de [{base:#x}, {base:#x} + {extent})")]
    OutOfBounds {
        address: u64,
        len: usize,
        base: u64,
        extent: usize,
    },

    #[error("débordement d'adresse: {address:#x} + {offset}")]
    AddressOverflow { address: u64, offset: i64 },
}

/// Région mémoire bornée, en lecture seule, adressée par adresses absolues.
///
/// Toutes les lectures passent par des accesseurs vérifiés: aucune
/// arithmétique de pointeur libre n'est faite sur la mémoire native. La vue
/// ne doit pas survivre au handle natif qui possède la mémoire.
#[derive(Clone, Copy)]
pub struct ForeignView<'a> {
    base: u64,
    bytes: &'a [u8],
}

/// Objet shader natif: la vue qui le contient et son adresse
#[derive(Debug, Clone, Copy)]
pub struct NativeShaderMemory<'a> {
    pub view: ForeignView<'a>,
    pub address: u64,
}

impl<'a> ForeignView<'a> {
    /// Crée une vue sur `bytes`, dont le premier octet est situé à `base`
    pub fn new(bytes: &'a [u8], base: u64) -> Self {
        Self { base, bytes }
    }

    /// Crée une vue sur une région mémoire native.
    ///
    /// # Safety
    ///
    /// `base` doit pointer sur `extent` octets lisibles qui restent valides et
    /// non modifiés pendant toute la durée `'a`.
    pub unsafe fn from_raw(base: *const u8, extent: usize) -> Self {
        let bytes = std::slice::from_raw_parts(base, extent);
        Self {
            base: base as u64,
            bytes,
        }
    }

    /// Adresse du premier octet de la vue
    pub fn base(&self) -> u64 {
        self.base
    }

    /// Taille de la vue en octets
    pub fn extent(&self) -> usize {
        self.bytes.len()
    }

    /// Vérifie qu'un accès de `len` octets à `address` reste dans la vue
    pub fn contains(&self, address: u64, len: usize) -> bool {
        self.slice(address, len).is_ok()
    }

    /// Calcule `address + offset` sans débordement
    pub fn offset(&self, address: u64, offset: i64) -> Result<u64, ViewError> {
        address
            .checked_add_signed(offset)
            .ok_or(ViewError::AddressOverflow { address, offset })
    }

    /// Retourne les `len` octets situés à `address`
    pub fn slice(&self, address: u64, len: usize) -> Result<&'a [u8], ViewError> {
        let out_of_bounds = || ViewError::OutOfBounds {
            address,
            len,
            base: self.base,
            extent: self.bytes.len(),
        };

        let start = address.checked_sub(self.base).ok_or_else(out_of_bounds)?;
        let start = usize::try_from(start).map_err(|_| out_of_bounds())?;
        let end = start.checked_add(len).ok_or_else(out_of_bounds)?;

        self.bytes.get(start..end).ok_or_else(out_of_bounds)
    }

    pub fn read_u8(&self, address: u64) -> Result<u8, ViewError> {
        Ok(self.slice(address, 1)?[0])
    }

    pub fn read_u32(&self, address: u64) -> Result<u32, ViewError> {
        let bytes = self.slice(address, 4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn read_i32(&self, address: u64) -> Result<i32, ViewError> {
        Ok(self.read_u32(address)? as i32)
    }

    /// Lit un pointeur natif (64 bits, petit-boutiste)
    pub fn read_ptr(&self, address: u64) -> Result<u64, ViewError> {
        let bytes = self.slice(address, 8)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(bytes);
        Ok(u64::from_le_bytes(raw))
    }

    /// Lit un identifiant de quatre caractères (`DXBC`, `ISGN`, ...)
    pub fn read_fourcc(&self, address: u64) -> Result<[u8; 4], ViewError> {
        let bytes = self.slice(address, 4)?;
        Ok([bytes[0], bytes[1], bytes[2], bytes[3]])
    }

    /// Lit une chaîne terminée par un zéro, sur au plus `max_len` octets.
    ///
    /// Retourne `None` si aucun terminateur n'est trouvé dans la limite.
    pub fn read_cstr(&self, address: u64, max_len: usize) -> Result<Option<&'a [u8]>, ViewError> {
        // Borne la recherche à la fin de la vue
        let end_of_view = self.base.saturating_add(self.bytes.len() as u64);
        let available = usize::try_from(end_of_view.saturating_sub(address)).unwrap_or(usize::MAX);
        let window = self.slice(address, max_len.min(available))?;

        Ok(window
            .iter()
            .position(|&b| b == 0)
            .map(|end| &window[..end]))
    }
}

impl std::fmt::Debug for ForeignView<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ForeignView")
            .field("base", &format_args!("{:#x}", self.base))
            .field("extent", &self.bytes.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: u64 = 0x1000;

    #[test]
    fn test_reads_are_little_endian() {
        let bytes = [0x78, 0x56, 0x34, 0x12, 0xEF, 0xCD, 0xAB, 0x90];
        let view = ForeignView::new(&bytes, BASE);

        assert_eq!(view.read_u8(BASE).unwrap(), 0x78);
        assert_eq!(view.read_u32(BASE).unwrap(), 0x12345678);
        assert_eq!(view.read_ptr(BASE).unwrap(), 0x90ABCDEF12345678);
    }

    #[test]
    fn test_out_of_bounds_reads_fail() {
        let bytes = [0u8; 8];
        let view = ForeignView::new(&bytes, BASE);

        assert!(view.read_u32(BASE + 4).is_ok());
        assert!(matches!(
            view.read_u32(BASE + 5),
            Err(ViewError::OutOfBounds { .. })
        ));
        assert!(view.read_u8(BASE - 1).is_err());
        assert!(view.read_u8(0).is_err());
        assert!(view.read_ptr(u64::MAX).is_err());
    }

    #[test]
    fn test_offset_overflow() {
        let bytes = [0u8; 4];
        let view = ForeignView::new(&bytes, BASE);

        assert_eq!(view.offset(BASE, 4).unwrap(), BASE + 4);
        assert_eq!(view.offset(BASE, -4).unwrap(), BASE - 4);
        assert!(matches!(
            view.offset(u64::MAX, 1),
            Err(ViewError::AddressOverflow { .. })
        ));
    }

    #[test]
    fn test_cstr_is_bounded() {
        let bytes = b"ISGN\0tail";
        let view = ForeignView::new(bytes, BASE);

        assert_eq!(view.read_cstr(BASE, 256).unwrap(), Some(&b"ISGN"[..]));
        assert_eq!(view.read_cstr(BASE, 3).unwrap(), None);
        // Pas de terminateur avant la fin de la vue
        assert_eq!(view.read_cstr(BASE + 5, 256).unwrap(), None);
    }
}
