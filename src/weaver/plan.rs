//! Injection plans and their total order.

use std::fmt;

use strum::Display;

use crate::{
    metadata::{
        method::Method,
        module::{MethodId, TypeId},
        token::Token,
    },
    weaver::declarations::{AdviceArgumentSource, InjectionTargets},
};

/// Where an advice is spliced into its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display)]
pub enum InjectionPoint {
    /// Ahead of the first instruction
    Before,
    /// Ahead of every return
    After,
    /// In place of the body, which becomes invocable through the wrapper chain
    Around,
}

/// Whether an aspect was declared on the class or on the member itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display)]
pub enum DeclarationLevel {
    /// Declared on the declaring class
    Class,
    /// Declared on the method, property or event
    Member,
}

/// Classification of a potential target method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum TargetKind {
    /// Instance constructor
    Constructor,
    /// Property getter
    Getter,
    /// Property setter
    Setter,
    /// Event `add` accessor
    EventAdd,
    /// Event `remove` accessor
    EventRemove,
    /// Any other method
    Method,
    /// Abstract, static or body-less; never woven
    Ineligible,
}

impl TargetKind {
    /// Classifies `method`.
    #[must_use]
    pub fn classify(method: &Method) -> Self {
        if method.is_abstract() || method.is_static() || method.body.is_none() {
            TargetKind::Ineligible
        } else if method.is_constructor() {
            TargetKind::Constructor
        } else if method.is_getter() {
            TargetKind::Getter
        } else if method.is_setter() {
            TargetKind::Setter
        } else if method.is_add_on() {
            TargetKind::EventAdd
        } else if method.is_remove_on() {
            TargetKind::EventRemove
        } else {
            TargetKind::Method
        }
    }

    /// Returns the annotation bit of this kind; empty for [`TargetKind::Ineligible`].
    #[must_use]
    pub fn mask(self) -> InjectionTargets {
        match self {
            TargetKind::Constructor => InjectionTargets::CONSTRUCTOR,
            TargetKind::Getter => InjectionTargets::GETTER,
            TargetKind::Setter => InjectionTargets::SETTER,
            TargetKind::EventAdd => InjectionTargets::EVENT_ADD,
            TargetKind::EventRemove => InjectionTargets::EVENT_REMOVE,
            TargetKind::Method => InjectionTargets::METHOD,
            TargetKind::Ineligible => InjectionTargets::empty(),
        }
    }

    /// Returns true if an advice declared for `targets` applies to this kind.
    #[must_use]
    pub fn accepted_by(self, targets: InjectionTargets) -> bool {
        let mask = self.mask();
        !mask.is_empty() && targets.contains(mask)
    }
}

/// One (target, advice) pairing, validated and ready to be woven.
#[derive(Debug, Clone, PartialEq)]
pub struct InjectionPlan {
    /// The method being rewritten
    pub target: MethodId,
    /// Token of the target, its declaration order
    pub target_token: Token,
    /// Name reported to advices: the property or event name for accessors
    pub target_name: String,
    /// Kind of the target
    pub kind: TargetKind,
    /// The aspect type providing the advice
    pub aspect: TypeId,
    /// Position of the aspect annotation on its element
    pub aspect_ordinal: usize,
    /// Parameterless constructor of the aspect, if it has one
    pub aspect_constructor: Option<MethodId>,
    /// The advice method
    pub advice: MethodId,
    /// Token of the advice, its declaration order
    pub advice_token: Token,
    /// True if the advice is called without an aspect instance
    pub advice_is_static: bool,
    /// Source of each advice parameter
    pub arguments: Vec<AdviceArgumentSource>,
    /// Where the advice is spliced
    pub point: InjectionPoint,
    /// Where the aspect was declared
    pub level: DeclarationLevel,
    /// True if the advice takes an abort flag
    pub abortable: bool,
}

impl InjectionPlan {
    /// Returns the key plans are ordered by.
    #[must_use]
    pub fn sort_key(&self) -> (Token, DeclarationLevel, usize, Token, InjectionPoint) {
        (
            self.target_token,
            self.level,
            self.aspect_ordinal,
            self.advice_token,
            self.point,
        )
    }
}

impl fmt::Display for InjectionPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} advice {} -> {} '{}' ({}, {}-level)",
            self.point, self.advice_token, self.kind, self.target_name, self.target_token, self.level
        )
    }
}

/// Sorts `plans` into weaving order.
pub fn order(plans: &mut [InjectionPlan]) {
    plans.sort_by_key(InjectionPlan::sort_key);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::method::{MethodBody, MethodModifiers, MethodSemantics, CTOR_NAME};

    fn with_body(name: &str) -> Method {
        let mut method = Method::new(name);
        method.body = Some(MethodBody::new());
        method
    }

    fn plan(target: u32, level: DeclarationLevel, ordinal: usize, advice: u32) -> InjectionPlan {
        InjectionPlan {
            target: MethodId(target as usize),
            target_token: Token::new(0x0600_0000 | target),
            target_name: "Target".to_string(),
            kind: TargetKind::Method,
            aspect: TypeId(0),
            aspect_ordinal: ordinal,
            aspect_constructor: None,
            advice: MethodId(advice as usize),
            advice_token: Token::new(0x0600_0000 | advice),
            advice_is_static: false,
            arguments: Vec::new(),
            point: InjectionPoint::Before,
            level,
            abortable: false,
        }
    }

    #[test]
    fn classification() {
        assert_eq!(TargetKind::classify(&with_body("Run")), TargetKind::Method);
        assert_eq!(TargetKind::classify(&with_body(CTOR_NAME)), TargetKind::Constructor);

        let mut getter = with_body("get_Value");
        getter.semantics = MethodSemantics::GETTER;
        assert_eq!(TargetKind::classify(&getter), TargetKind::Getter);

        let mut remove = with_body("remove_Changed");
        remove.semantics = MethodSemantics::REMOVE_ON;
        assert_eq!(TargetKind::classify(&remove), TargetKind::EventRemove);

        let mut stat = with_body("Create");
        stat.modifiers |= MethodModifiers::STATIC;
        assert_eq!(TargetKind::classify(&stat), TargetKind::Ineligible);

        let mut abs = with_body("Run");
        abs.modifiers |= MethodModifiers::ABSTRACT;
        assert_eq!(TargetKind::classify(&abs), TargetKind::Ineligible);

        assert_eq!(TargetKind::classify(&Method::new("Extern")), TargetKind::Ineligible);
    }

    #[test]
    fn kind_masks() {
        assert!(TargetKind::Getter.accepted_by(InjectionTargets::GETTER | InjectionTargets::SETTER));
        assert!(!TargetKind::Method.accepted_by(InjectionTargets::GETTER));
        assert!(!TargetKind::Ineligible.accepted_by(InjectionTargets::all()));
    }

    #[test]
    fn order_is_total() {
        let mut plans = vec![
            plan(2, DeclarationLevel::Class, 0, 10),
            plan(1, DeclarationLevel::Member, 0, 10),
            plan(1, DeclarationLevel::Class, 1, 10),
            plan(1, DeclarationLevel::Class, 0, 11),
            plan(1, DeclarationLevel::Class, 0, 10),
        ];
        order(&mut plans);
        let keys: Vec<(usize, DeclarationLevel, usize, usize)> = plans
            .iter()
            .map(|p| (p.target.0, p.level, p.aspect_ordinal, p.advice.0))
            .collect();

        assert_eq!(
            keys,
            vec![
                (1, DeclarationLevel::Class, 0, 10),
                (1, DeclarationLevel::Class, 0, 11),
                (1, DeclarationLevel::Class, 1, 10),
                (1, DeclarationLevel::Member, 0, 10),
                (2, DeclarationLevel::Class, 0, 10),
            ]
        );
    }
}
