/*
 * registry.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of Plico, a MIME message parsing and formatting library.
 *
 * Plico is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Plico is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Plico.  If not, see <http://www.gnu.org/licenses/>.
 */

//! Content-type driven entity construction. The assembler asks the
//! registry for a node whenever a header block completes; applications
//! can register factories for specific types or whole primary types.

use std::collections::HashMap;

use bytes::Bytes;

use crate::content_type::ContentType;
use crate::entity::{Body, EntityOffsets, MimeEntity};
use crate::header::HeaderList;
use crate::options::ParserOptions;

/// Builds the entity node for one parsed header block. The body shape it
/// installs is a starting point; the assembler fills leaf content, child
/// parts or the embedded message afterwards.
pub type EntityFactory =
    fn(&ParserOptions, &ContentType, HeaderList, bool) -> MimeEntity;

/// Factory table keyed on `type/subtype`, with `type/*` wildcards.
#[derive(Clone, Debug, Default)]
pub struct EntityRegistry {
    factories: HashMap<String, EntityFactory>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        EntityRegistry::default()
    }

    /// Register a factory for `type/subtype` or `type/*`. Later
    /// registrations replace earlier ones for the same key.
    pub fn register(&mut self, mime_type: &str, factory: EntityFactory) {
        self.factories
            .insert(mime_type.to_ascii_lowercase(), factory);
    }

    /// Resolve exact type, then `type/*`, then the built-in default.
    pub fn create(
        &self,
        options: &ParserOptions,
        content_type: &ContentType,
        headers: HeaderList,
        top_level: bool,
    ) -> MimeEntity {
        let exact = content_type.mime_type();
        let factory = self
            .factories
            .get(&exact)
            .or_else(|| {
                let wildcard =
                    format!("{}/*", content_type.primary_type().to_ascii_lowercase());
                self.factories.get(&wildcard)
            })
            .copied()
            .unwrap_or(default_entity);
        factory(options, content_type, headers, top_level)
    }
}

/// The built-in factory: multiparts get an empty child list, everything
/// else starts without a body. Embedded message bodies are installed by
/// the assembler once the inner parse finishes.
pub fn default_entity(
    _options: &ParserOptions,
    content_type: &ContentType,
    headers: HeaderList,
    _top_level: bool,
) -> MimeEntity {
    let body = if content_type.is_multipart() {
        Body::Multipart {
            preamble: Bytes::new(),
            parts: Vec::new(),
            epilogue: Bytes::new(),
        }
    } else {
        Body::Empty
    };
    MimeEntity::from_parse(headers, body, EntityOffsets::default(), None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::TransferEncoding;
    use crate::entity::Content;

    fn ct(mime: &str) -> ContentType {
        ContentType::parse(mime).unwrap()
    }

    #[test]
    fn default_shapes_follow_the_content_type() {
        let options = ParserOptions::default();
        let registry = EntityRegistry::new();
        let entity = registry.create(&options, &ct("multipart/mixed"), HeaderList::new(), true);
        assert!(entity.parts().is_some());
        let entity = registry.create(&options, &ct("text/plain"), HeaderList::new(), true);
        assert!(matches!(entity.body(), Body::Empty));
    }

    #[test]
    fn exact_registrations_win() {
        fn stamped(
            _options: &ParserOptions,
            _ct: &ContentType,
            headers: HeaderList,
            _top: bool,
        ) -> MimeEntity {
            let mut entity = MimeEntity::from_parse(
                headers,
                Body::Empty,
                EntityOffsets::default(),
                None,
            );
            entity.set_body(Body::Data(Content::new(
                &b"stamped"[..],
                TransferEncoding::Default,
            )));
            entity
        }

        let options = ParserOptions::default();
        let mut registry = EntityRegistry::new();
        registry.register("application/x-custom", stamped);
        let entity = registry.create(
            &options,
            &ct("Application/X-Custom"),
            HeaderList::new(),
            false,
        );
        assert!(entity.content().is_some());
    }

    #[test]
    fn wildcards_catch_the_primary_type() {
        fn leafish(
            _options: &ParserOptions,
            _ct: &ContentType,
            headers: HeaderList,
            _top: bool,
        ) -> MimeEntity {
            let mut entity = MimeEntity::from_parse(
                headers,
                Body::Empty,
                EntityOffsets::default(),
                None,
            );
            entity.set_body(Body::Data(Content::new(
                &b"image"[..],
                TransferEncoding::Default,
            )));
            entity
        }

        let options = ParserOptions::default();
        let mut registry = EntityRegistry::new();
        registry.register("image/*", leafish);
        assert!(registry
            .create(&options, &ct("image/png"), HeaderList::new(), false)
            .content()
            .is_some());
        assert!(registry
            .create(&options, &ct("video/mp4"), HeaderList::new(), false)
            .content()
            .is_none());
    }
}
