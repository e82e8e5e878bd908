//! §4.9 Delete Confirmation Tier: `test` namespaces accept a boolean
//! confirmation; `prod` namespaces require the caller to retype the VM's
//! exact current name (**P8**).

use crate::errors::{EngineError, EngineResult, ErrorCode};
use crate::models::Environment;

pub struct DeleteConfirmation<'a> {
    pub confirm: bool,
    pub confirm_name: Option<&'a str>,
}

pub fn check_delete_confirmation(
    environment: Environment,
    vm_name: &str,
    confirmation: &DeleteConfirmation<'_>,
) -> EngineResult<()> {
    match environment {
        Environment::Test => {
            if confirmation.confirm {
                Ok(())
            } else {
                Err(EngineError::new(ErrorCode::DeleteConfirmationRequired, "confirm must be true to delete this vm"))
            }
        }
        Environment::Prod => match confirmation.confirm_name {
            Some(name) if name == vm_name => Ok(()),
            Some(_) => Err(EngineError::new(ErrorCode::ConfirmationNameMismatch, "confirm_name does not match the vm's current name")),
            None => Err(EngineError::new(ErrorCode::DeleteConfirmationRequired, "confirm_name is required to delete a prod vm")),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_accepts_bare_confirm() {
        let confirmation = DeleteConfirmation { confirm: true, confirm_name: None };
        assert!(check_delete_confirmation(Environment::Test, "vm-1", &confirmation).is_ok());
    }

    #[test]
    fn test_env_rejects_missing_confirm() {
        let confirmation = DeleteConfirmation { confirm: false, confirm_name: None };
        let err = check_delete_confirmation(Environment::Test, "vm-1", &confirmation).unwrap_err();
        assert_eq!(err.code, ErrorCode::DeleteConfirmationRequired);
    }

    #[test]
    fn prod_env_requires_exact_name_match() {
        let confirmation = DeleteConfirmation { confirm: false, confirm_name: Some("prod-x-svcb-07") };
        assert!(check_delete_confirmation(Environment::Prod, "prod-x-svcb-07", &confirmation).is_ok());
    }

    #[test]
    fn prod_env_rejects_bare_confirm() {
        let confirmation = DeleteConfirmation { confirm: true, confirm_name: None };
        let err = check_delete_confirmation(Environment::Prod, "prod-x-svcb-07", &confirmation).unwrap_err();
        assert_eq!(err.code, ErrorCode::DeleteConfirmationRequired);
    }

    #[test]
    fn prod_env_rejects_name_mismatch() {
        let confirmation = DeleteConfirmation { confirm: false, confirm_name: Some("wrong-name") };
        let err = check_delete_confirmation(Environment::Prod, "prod-x-svcb-07", &confirmation).unwrap_err();
        assert_eq!(err.code, ErrorCode::ConfirmationNameMismatch);
    }
}
