//! Builds [`BeanMetadata`] by merging every declaration source across a
//! type's ancestors.

use super::bean::{
    BeanMetadata, ContainerElementMetadata, DefaultGroupSequence, ElementMetadata, ExecutableMetadata,
    ExecutableSignature, ParameterMetadata, PropertyMetadata,
};
use super::checks::{check_group_conversions, valid_default_group_list};
use super::declaration::{ConstraintLocation, DeclarationFactory, DeclarationSite};
use super::source::{
    ContainerElementDeclaration, ContainerSlot, DeclarationSource, ElementDeclaration, ExecutableDeclaration,
    ExecutableKind, MemberKind, RawConstraint, SourceOrigin, TypeDeclarations,
};
use crate::core::{Group, TypeGraph, TypeName, TypeRef};
use crate::error::ConfigurationError;
use crate::groups::ValidationOrderGenerator;
use crate::registry::ConstraintRegistry;
use indexmap::IndexMap;
use std::sync::Arc;
use tracing::debug;

/// One source's declarations on one type.
struct Layer {
    origin: SourceOrigin,
    declarations: TypeDeclarations,
}

/// Borrowed view shared by element and container element declarations.
struct ElementParts<'d> {
    constraints: &'d [RawConstraint],
    cascade: bool,
    group_conversions: &'d [(Group, Group)],
    container_elements: &'d [ContainerElementDeclaration],
}

impl<'d> From<&'d ElementDeclaration> for ElementParts<'d> {
    fn from(element: &'d ElementDeclaration) -> Self {
        Self {
            constraints: &element.constraints,
            cascade: element.cascade,
            group_conversions: &element.group_conversions,
            container_elements: &element.container_elements,
        }
    }
}

impl<'d> From<&'d ContainerElementDeclaration> for ElementParts<'d> {
    fn from(element: &'d ContainerElementDeclaration) -> Self {
        Self {
            constraints: &element.constraints,
            cascade: element.cascade,
            group_conversions: &element.group_conversions,
            container_elements: &element.nested,
        }
    }
}

struct ExecutableDraft {
    metadata: ExecutableMetadata,
    /// Types declaring the executable, most specific first.
    declared_in: Vec<TypeName>,
    /// Types adding parameter constraints or cascades.
    parameter_contributors: Vec<TypeName>,
}

/// Builds [`BeanMetadata`] for one type from every declaration source,
/// merging the layers of its hierarchy.
pub struct MetadataBuilder<'a> {
    types: &'a TypeGraph,
    registry: &'a ConstraintRegistry,
    generator: &'a ValidationOrderGenerator,
    sources: &'a [Arc<dyn DeclarationSource>],
}

impl<'a> MetadataBuilder<'a> {
    pub fn new(
        types: &'a TypeGraph,
        registry: &'a ConstraintRegistry,
        generator: &'a ValidationOrderGenerator,
        sources: &'a [Arc<dyn DeclarationSource>],
    ) -> Self {
        Self {
            types,
            registry,
            generator,
            sources,
        }
    }

    /// Builds the metadata of `type_name`. Undeclared types yield metadata
    /// without constraints.
    pub fn build(&self, type_name: &TypeName) -> Result<BeanMetadata, ConfigurationError> {
        let factory = DeclarationFactory::new(self.registry);
        let ancestors = self.types.ancestors(type_name);

        let mut class_constraints: IndexMap<TypeName, Vec<_>> = IndexMap::new();
        let mut properties: IndexMap<String, PropertyMetadata> = IndexMap::new();
        let mut drafts: IndexMap<ExecutableSignature, ExecutableDraft> = IndexMap::new();
        let mut own_layers = Vec::new();

        for ancestor in &ancestors {
            let layers = self.layers(ancestor);
            for (index, layer) in layers.iter().enumerate() {
                let declarations = &layer.declarations;
                let site = DeclarationSite {
                    declaring_type: ancestor,
                    location: ConstraintLocation::Bean,
                    origin: layer.origin,
                    layer: index,
                    member: "<class>",
                };
                let expanded = factory.expand_all(&declarations.class_constraints, &site)?;
                if !expanded.is_empty() {
                    class_constraints.entry(ancestor.clone()).or_default().extend(expanded);
                }

                for property in &declarations.properties {
                    let name = property.property_name();
                    let site = DeclarationSite {
                        declaring_type: ancestor,
                        location: ConstraintLocation::Property { name: name.clone() },
                        origin: layer.origin,
                        layer: index,
                        member: &property.member,
                    };
                    let entry = properties.entry(name.clone()).or_insert_with(|| PropertyMetadata {
                        name,
                        element: ElementMetadata::new(property.element.declared_type.clone()),
                    });
                    self.merge_element(&factory, &mut entry.element, (&property.element).into(), &site)?;
                }

                for executable in &declarations.executables {
                    if executable.kind == ExecutableKind::Constructor && ancestor != type_name {
                        continue;
                    }
                    self.merge_executable(&factory, &mut drafts, ancestor, (layer.origin, index), executable)?;
                }
            }
            if ancestor == type_name {
                own_layers = layers;
            }
        }

        for property in properties.values_mut() {
            let element = format!("{type_name}.{}", property.name);
            self.check_conversions(&element, &mut property.element)?;
        }
        let executables = self.finish_executables(type_name, drafts)?;
        let default_group_sequence = self.default_group_sequence(type_name, &own_layers)?;

        let mut direct_types = vec![type_name.clone()];
        direct_types.extend(self.types.direct_interfaces(type_name));

        let metadata = BeanMetadata {
            type_name: type_name.clone(),
            class_hierarchy: self.types.class_hierarchy(type_name),
            ancestors,
            direct_types,
            class_constraints,
            properties,
            executables,
            default_group_sequence,
        };
        debug!(
            type_name = %type_name,
            ancestors = metadata.ancestors.len(),
            class_constraints = metadata.class_constraints().count(),
            properties = metadata.properties.len(),
            executables = metadata.executables.len(),
            redefined_default = metadata.is_default_group_sequence_redefined(),
            "Built bean metadata"
        );
        Ok(metadata)
    }

    /// Declarations of `type_name` from every source, lowest precedence
    /// first, with inline declarations dropped where another source asks so.
    fn layers(&self, type_name: &TypeName) -> Vec<Layer> {
        let mut layers: Vec<Layer> = self
            .sources
            .iter()
            .flat_map(|source| {
                let origin = source.origin();
                source
                    .declarations_for(type_name)
                    .into_iter()
                    .map(move |declarations| Layer { origin, declarations })
            })
            .collect();
        layers.sort_by_key(|layer| layer.origin);

        let overriding: Vec<&TypeDeclarations> = layers
            .iter()
            .filter(|layer| layer.origin != SourceOrigin::Inline)
            .map(|layer| &layer.declarations)
            .collect();
        if overriding.iter().any(|d| d.ignore_inline) {
            layers.retain(|layer| layer.origin != SourceOrigin::Inline);
            return layers;
        }

        let ignored_members: Vec<(MemberKind, String)> = overriding
            .iter()
            .flat_map(|d| d.properties.iter())
            .filter(|p| p.ignore_inline)
            .map(|p| (p.kind, p.member.clone()))
            .collect();
        let ignored_executables: Vec<(ExecutableKind, String, usize)> = overriding
            .iter()
            .flat_map(|d| d.executables.iter())
            .filter(|e| e.ignore_inline)
            .map(|e| (e.kind, e.name.clone(), e.parameters.len()))
            .collect();
        if ignored_members.is_empty() && ignored_executables.is_empty() {
            return layers;
        }

        for layer in layers.iter_mut().filter(|l| l.origin == SourceOrigin::Inline) {
            layer
                .declarations
                .properties
                .retain(|p| !ignored_members.contains(&(p.kind, p.member.clone())));
            layer
                .declarations
                .executables
                .retain(|e| !ignored_executables.contains(&(e.kind, e.name.clone(), e.parameters.len())));
        }
        layers
    }

    fn merge_element(
        &self,
        factory: &DeclarationFactory<'_>,
        target: &mut ElementMetadata,
        parts: ElementParts<'_>,
        site: &DeclarationSite<'_>,
    ) -> Result<(), ConfigurationError> {
        target.constraints.extend(factory.expand_all(parts.constraints, site)?);
        target.cascading |= parts.cascade;
        target.group_conversions.extend(parts.group_conversions.iter().cloned());

        for container in parts.container_elements {
            let slot_type = self.slot_type(&target.declared_type, container.slot).ok_or_else(|| {
                ConfigurationError::UnsupportedContainerSlot {
                    element: format!("{}.{}", site.declaring_type, site.location),
                    container: target.declared_type.clone(),
                    slot: container.slot,
                }
            })?;
            let position = match target.container_elements.iter().position(|c| c.slot == container.slot) {
                Some(position) => position,
                None => {
                    target.container_elements.push(ContainerElementMetadata {
                        slot: container.slot,
                        element: ElementMetadata::new(slot_type),
                    });
                    target.container_elements.len() - 1
                }
            };
            let nested_site = DeclarationSite {
                declaring_type: site.declaring_type,
                location: ConstraintLocation::container_element(&site.location, container.slot),
                origin: site.origin,
                layer: site.layer,
                member: site.member,
            };
            self.merge_element(
                factory,
                &mut target.container_elements[position].element,
                container.into(),
                &nested_site,
            )?;
        }
        Ok(())
    }

    /// Type argument bound to `slot` in `container`, or `None` when the
    /// container has no such slot.
    fn slot_type(&self, container: &TypeRef, slot: ContainerSlot) -> Option<TypeRef> {
        let name = container.erased_name();
        let target = match slot {
            ContainerSlot::Element if self.types.is_subtype(&name, &TypeName::new("Array")) => "Array",
            ContainerSlot::Element => "Iterable",
            ContainerSlot::MapKey | ContainerSlot::MapValue => "Map",
        };
        let target = TypeName::new(target);
        if !self.types.is_subtype(&name, &target) {
            return None;
        }
        let argument = self
            .types
            .supertype_as(container, &target)
            .map(|view| view.arg_or_object(slot.type_argument()))
            .unwrap_or_else(TypeRef::object);
        Some(match argument {
            TypeRef::Named { .. } => argument,
            _ => TypeRef::object(),
        })
    }

    /// Checks group conversions on `element` and its container elements and
    /// collapses identical conversions declared by several layers.
    fn check_conversions(&self, name: &str, element: &mut ElementMetadata) -> Result<(), ConfigurationError> {
        check_group_conversions(
            name,
            &element.group_conversions,
            element.cascading,
            self.generator.registry(),
        )?;
        let mut unique: Vec<(Group, Group)> = Vec::with_capacity(element.group_conversions.len());
        for conversion in element.group_conversions.drain(..) {
            if !unique.contains(&conversion) {
                unique.push(conversion);
            }
        }
        element.group_conversions = unique;

        for container in &mut element.container_elements {
            let nested = format!("{name}{}", container.slot);
            self.check_conversions(&nested, &mut container.element)?;
        }
        Ok(())
    }

    fn merge_executable(
        &self,
        factory: &DeclarationFactory<'_>,
        drafts: &mut IndexMap<ExecutableSignature, ExecutableDraft>,
        declaring_type: &TypeName,
        (origin, layer): (SourceOrigin, usize),
        executable: &ExecutableDeclaration,
    ) -> Result<(), ConfigurationError> {
        let signature = ExecutableSignature {
            kind: executable.kind,
            name: executable.name.clone(),
            parameter_types: executable
                .parameters
                .iter()
                .map(|p| p.element.declared_type.clone())
                .collect(),
        };
        let label = signature.to_string();
        let draft = drafts.entry(signature.clone()).or_insert_with(|| ExecutableDraft {
            metadata: ExecutableMetadata {
                signature,
                parameters: executable
                    .parameters
                    .iter()
                    .enumerate()
                    .map(|(index, p)| ParameterMetadata {
                        index,
                        name: format!("arg{index}"),
                        element: ElementMetadata::new(p.element.declared_type.clone()),
                    })
                    .collect(),
                cross_parameter: Vec::new(),
                return_value: None,
            },
            declared_in: Vec::new(),
            parameter_contributors: Vec::new(),
        });

        if !draft.declared_in.contains(declaring_type) {
            draft.declared_in.push(declaring_type.clone());
        }
        let contributes = !executable.cross_parameter.is_empty()
            || executable.parameters.iter().any(|p| {
                !p.element.constraints.is_empty() || p.element.cascade || !p.element.container_elements.is_empty()
            });
        if contributes && !draft.parameter_contributors.contains(declaring_type) {
            draft.parameter_contributors.push(declaring_type.clone());
        }

        for (index, parameter) in executable.parameters.iter().enumerate() {
            let target = &mut draft.metadata.parameters[index];
            if let Some(name) = &parameter.name {
                if target.name == format!("arg{index}") {
                    target.name = name.clone();
                }
            }
            let site = DeclarationSite {
                declaring_type,
                location: ConstraintLocation::Parameter {
                    executable: label.clone(),
                    index,
                },
                origin,
                layer,
                member: &label,
            };
            self.merge_element(factory, &mut target.element, (&parameter.element).into(), &site)?;
        }

        let site = DeclarationSite {
            declaring_type,
            location: ConstraintLocation::CrossParameter {
                executable: label.clone(),
            },
            origin,
            layer,
            member: &label,
        };
        draft
            .metadata
            .cross_parameter
            .extend(factory.expand_all(&executable.cross_parameter, &site)?);

        if let Some(return_value) = &executable.return_value {
            let site = DeclarationSite {
                declaring_type,
                location: ConstraintLocation::ReturnValue {
                    executable: label.clone(),
                },
                origin,
                layer,
                member: &label,
            };
            let target = draft
                .metadata
                .return_value
                .get_or_insert_with(|| ElementMetadata::new(return_value.declared_type.clone()));
            self.merge_element(factory, target, return_value.into(), &site)?;
        }
        Ok(())
    }

    /// Applies the overriding rule: parameter constraints of an executable
    /// declared in several types may only come from the least specific one.
    fn finish_executables(
        &self,
        type_name: &TypeName,
        drafts: IndexMap<ExecutableSignature, ExecutableDraft>,
    ) -> Result<IndexMap<ExecutableSignature, ExecutableMetadata>, ConfigurationError> {
        let mut executables = IndexMap::with_capacity(drafts.len());
        for (signature, mut draft) in drafts {
            if let Some(topmost) = draft.declared_in.last().filter(|_| draft.declared_in.len() > 1) {
                if let Some(offender) = draft.parameter_contributors.iter().find(|c| *c != topmost) {
                    return Err(ConfigurationError::IllegalParameterConstraints {
                        type_name: offender.clone(),
                        executable: signature.to_string(),
                        overridden_in: topmost.clone(),
                    });
                }
            }
            for parameter in &mut draft.metadata.parameters {
                let element = format!("{type_name}.{signature}#{}", parameter.index);
                self.check_conversions(&element, &mut parameter.element)?;
            }
            if let Some(return_value) = &mut draft.metadata.return_value {
                let element = format!("{type_name}.{signature}<return value>");
                self.check_conversions(&element, return_value)?;
            }
            executables.insert(signature, draft.metadata);
        }
        Ok(executables)
    }

    /// The default sequence comes from the type's own declarations only; the
    /// highest precedence layer defining one wins.
    fn default_group_sequence(
        &self,
        type_name: &TypeName,
        layers: &[Layer],
    ) -> Result<DefaultGroupSequence, ConfigurationError> {
        let mut redefinition: Option<&TypeDeclarations> = None;
        for layer in layers {
            let declarations = &layer.declarations;
            match (&declarations.default_group_sequence, &declarations.group_sequence_provider) {
                (Some(_), Some(_)) => {
                    return Err(ConfigurationError::SequenceAndProvider {
                        type_name: type_name.clone(),
                    })
                }
                (None, None) => {}
                _ => redefinition = Some(declarations),
            }
        }

        let Some(declarations) = redefinition else {
            return Ok(DefaultGroupSequence::Implicit);
        };
        if let Some(provider) = &declarations.group_sequence_provider {
            return Ok(DefaultGroupSequence::Provider(provider.clone()));
        }
        match &declarations.default_group_sequence {
            Some(groups) => {
                let groups = valid_default_group_list(type_name, groups)?;
                let sequence = Arc::new(self.generator.default_sequence(type_name, &groups)?);
                Ok(DefaultGroupSequence::Redefined { groups, sequence })
            }
            None => Ok(DefaultGroupSequence::Implicit),
        }
    }
}
